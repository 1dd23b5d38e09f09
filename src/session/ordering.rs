use std::collections::HashMap;

use crate::schemas::Question;

/// Items that may share a media asset (passage, image, audio) with their neighbours.
pub trait MediaGrouped {
    fn media_key(&self) -> Option<&str>;
}

impl MediaGrouped for Question {
    fn media_key(&self) -> Option<&str> {
        self.shared_media_id()
    }
}

/// Display order for `items`, as indices into the input.
///
/// Items sharing a media key are emitted as one contiguous block placed where the
/// first member of the group sits; everything else keeps its original relative order.
/// Ungrouped items that come before a group therefore stay before it rather than being
/// moved to the end: `[B, A(x), C(x)]` orders as `[B, A, C]`.
/// Every index appears exactly once. The order is for display only and must not be
/// used to address answers, which stay keyed by question id.
pub fn shared_media_order<T: MediaGrouped>(items: &[T]) -> Vec<usize> {
    let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
    for (index, item) in items.iter().enumerate() {
        if let Some(key) = item.media_key() {
            groups.entry(key).or_default().push(index);
        }
    }

    let mut visited = vec![false; items.len()];
    let mut order = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        if visited[index] {
            continue;
        }

        let members = item.media_key().and_then(|key| groups.get(key));
        match members {
            Some(members) => {
                for &member in members {
                    if !visited[member] {
                        visited[member] = true;
                        order.push(member);
                    }
                }
            }
            None => {
                visited[index] = true;
                order.push(index);
            }
        }
    }

    order
}

/// Group of consecutive display positions that share one media asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaBlock {
    pub media_id: String,
    pub positions: std::ops::Range<usize>,
}

/// Contiguous shared-media blocks in an already computed display order, so the media is
/// rendered once above its questions.
pub fn media_blocks<T: MediaGrouped>(items: &[T], order: &[usize]) -> Vec<MediaBlock> {
    let mut blocks: Vec<MediaBlock> = Vec::new();

    for (position, &index) in order.iter().enumerate() {
        let Some(key) = items.get(index).and_then(|item| item.media_key()) else {
            continue;
        };

        match blocks.last_mut() {
            Some(block) if block.media_id == key && block.positions.end == position => {
                block.positions.end = position + 1;
            }
            _ => blocks.push(MediaBlock {
                media_id: key.to_string(),
                positions: position..position + 1,
            }),
        }
    }

    blocks
}
