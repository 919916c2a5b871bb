use crate::entry::Entry;

use std::sync::Arc;

use generational_arena::{Arena, Index};

#[derive(Debug)]
struct Node<K, V> {
  entry: Arc<Entry<K, V>>,
  next: Option<Index>,
  prev: Option<Index>,
}

/// The global recency order, most-recently-used at the head.
///
/// Nodes live in an arena and every linked entry remembers its own index, so
/// no key lookup is needed to move or unlink it. Owned by the coordinator.
pub(crate) struct RecencyList<K, V> {
  nodes: Arena<Node<K, V>>,
  head: Option<Index>,
  tail: Option<Index>,
}

impl<K, V> RecencyList<K, V> {
  pub fn new() -> Self {
    Self {
      nodes: Arena::new(),
      head: None,
      tail: None,
    }
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  // Helper to unlink a node from the list.
  // It doesn't handle arena removal.
  fn unlink(&mut self, index: Index) {
    let node = &self.nodes[index];
    let prev_node_idx = node.prev;
    let next_node_idx = node.next;

    if let Some(prev_idx) = prev_node_idx {
      self.nodes[prev_idx].next = next_node_idx;
    } else {
      self.head = next_node_idx;
    }

    if let Some(next_idx) = next_node_idx {
      self.nodes[next_idx].prev = prev_node_idx;
    } else {
      self.tail = prev_node_idx;
    }
  }

  // Helper to make an arena-resident node the new head.
  fn push_front_node(&mut self, index: Index) {
    let old_head_idx = self.head;
    self.nodes[index].next = old_head_idx;
    self.nodes[index].prev = None;
    self.head = Some(index);

    if let Some(old_head) = old_head_idx {
      self.nodes[old_head].prev = Some(index);
    }

    if self.tail.is_none() {
      self.tail = Some(index);
    }
  }

  /// Returns the node index only if it still belongs to `entry`.
  fn owned_index(&self, entry: &Arc<Entry<K, V>>) -> Option<Index> {
    let index = entry.list_index()?;
    match self.nodes.get(index) {
      Some(node) if Arc::ptr_eq(&node.entry, entry) => Some(index),
      _ => None,
    }
  }

  pub fn contains(&self, entry: &Arc<Entry<K, V>>) -> bool {
    self.owned_index(entry).is_some()
  }

  /// Links a new entry at the head and records the handle on the entry.
  pub fn push_front(&mut self, entry: Arc<Entry<K, V>>) {
    let index = self.nodes.insert(Node {
      entry: entry.clone(),
      next: None,
      prev: None,
    });
    entry.set_list_index(Some(index));
    self.push_front_node(index);
  }

  pub fn move_to_front(&mut self, entry: &Arc<Entry<K, V>>) {
    if let Some(index) = self.owned_index(entry) {
      if self.head != Some(index) {
        self.unlink(index);
        self.push_front_node(index);
      }
    }
  }

  /// Unlinks `entry`, clearing its handle. Returns `false` if it wasn't listed.
  pub fn remove(&mut self, entry: &Arc<Entry<K, V>>) -> bool {
    match self.owned_index(entry) {
      Some(index) => {
        self.unlink(index);
        self.nodes.remove(index);
        entry.set_list_index(None);
        true
      }
      None => false,
    }
  }

  /// The least-recently-used entry.
  pub fn back(&self) -> Option<&Arc<Entry<K, V>>> {
    self.tail.map(|index| &self.nodes[index].entry)
  }

  /// The entry one step closer to the head than `entry`.
  pub fn prev(&self, entry: &Arc<Entry<K, V>>) -> Option<&Arc<Entry<K, V>>> {
    let index = self.owned_index(entry)?;
    self.nodes[index].prev.map(|prev| &self.nodes[prev].entry)
  }

  /// Empties the list, handing every entry that was linked to `detach`.
  pub fn drain(&mut self, mut detach: impl FnMut(Arc<Entry<K, V>>)) {
    let mut current = self.head;
    while let Some(index) = current {
      current = self.nodes[index].next;
      if let Some(node) = self.nodes.remove(index) {
        node.entry.set_list_index(None);
        detach(node.entry);
      }
    }
    self.head = None;
    self.tail = None;
  }

  // A helper for tests, to get the order of keys from head to tail.
  #[cfg(test)]
  pub(crate) fn keys_as_vec(&self) -> Vec<K>
  where
    K: Clone,
  {
    let mut keys = Vec::new();
    let mut current = self.head;
    while let Some(index) = current {
      keys.push(self.nodes[index].entry.key().clone());
      current = self.nodes[index].next;
    }
    keys
  }
}
