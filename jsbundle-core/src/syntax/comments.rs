use serde::{Deserialize, Serialize};
use swc_core::common::comments::{Comment, Comments, SingleThreadedComments};
use swc_core::common::BytePos;

/// Comments of one module keyed by absolute byte position
///
/// Plain data so it can live in the session and the cache; it is poured
/// into a swc comment store only while printing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleComments {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub leading: Vec<(u32, Vec<Comment>)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trailing: Vec<(u32, Vec<Comment>)>,
}

impl ModuleComments {
    pub fn from_store(store: &SingleThreadedComments) -> Self {
        let (leading, trailing) = store.borrow_all();
        Self {
            leading: sorted(leading.iter()),
            trailing: sorted(trailing.iter()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.leading.is_empty() && self.trailing.is_empty()
    }

    /// Copy into a swc store for the printer
    pub fn add_to(&self, store: &SingleThreadedComments) {
        for (pos, comments) in &self.leading {
            store.add_leading_comments(BytePos(*pos), comments.clone());
        }
        for (pos, comments) in &self.trailing {
            store.add_trailing_comments(BytePos(*pos), comments.clone());
        }
    }

    /// Drop every comment attached at a position in `lo + 1 ..= hi`
    pub fn remove_between(&mut self, lo: u32, hi: u32) {
        let outside = |(pos, _): &(u32, Vec<Comment>)| *pos <= lo || *pos > hi;
        self.leading.retain(outside);
        self.trailing.retain(outside);
    }

    /// Re-attach the leading comments at `from` to `to`
    pub fn move_leading(&mut self, from: u32, to: u32) {
        if from == to {
            return;
        }
        let Some(at) = self.leading.iter().position(|(pos, _)| *pos == from) else {
            return;
        };
        let (_, moved) = self.leading.remove(at);
        match self.leading.iter_mut().find(|(pos, _)| *pos == to) {
            Some((_, existing)) => {
                let mut merged = moved;
                merged.append(existing);
                *existing = merged;
            }
            None => {
                self.leading.push((to, moved));
                self.leading.sort_by_key(|(pos, _)| *pos);
            }
        }
    }

    /// Drop `//# sourceMappingURL=` comments; the bundle carries its own
    pub fn drop_source_mapping_urls(&mut self) {
        for (_, comments) in self.leading.iter_mut().chain(self.trailing.iter_mut()) {
            comments.retain(|comment| !is_source_mapping_url(&comment.text));
        }
        self.leading.retain(|(_, comments)| !comments.is_empty());
        self.trailing.retain(|(_, comments)| !comments.is_empty());
    }
}

fn sorted<'a>(
    entries: impl Iterator<Item = (&'a BytePos, &'a Vec<Comment>)>,
) -> Vec<(u32, Vec<Comment>)> {
    let mut entries: Vec<(u32, Vec<Comment>)> = entries
        .map(|(pos, comments)| (pos.0, comments.clone()))
        .collect();
    entries.sort_by_key(|(pos, _)| *pos);
    entries
}

fn is_source_mapping_url(text: &str) -> bool {
    let text = text.trim_start();
    text.starts_with("# sourceMappingURL=") || text.starts_with("@ sourceMappingURL=")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_module;

    #[test]
    fn test_comments_collected_at_absolute_positions() {
        let parsed = parse_module("// head\na();\n//# sourceMappingURL=a.js.map\n", 100).unwrap();
        let mut comments = parsed.comments;
        assert!(comments.leading.iter().any(|(pos, _)| *pos == 108));

        comments.drop_source_mapping_urls();
        let texts: Vec<&str> = comments
            .leading
            .iter()
            .chain(comments.trailing.iter())
            .flat_map(|(_, c)| c.iter().map(|c| &*c.text))
            .collect();
        assert_eq!(texts, [" head"]);
    }

    #[test]
    fn test_remove_between_keeps_bounds_out() {
        let parsed = parse_module("/* a */ x; /* b */ y;", 1).unwrap();
        let mut comments = parsed.comments;
        let before = comments.leading.len();
        comments.remove_between(1, 9);
        assert_eq!(comments.leading.len(), before - 1);
    }

    #[test]
    fn test_move_leading() {
        let parsed = parse_module("/* a */ x;", 1).unwrap();
        let mut comments = parsed.comments;
        let from = comments.leading[0].0;
        comments.move_leading(from, 50);
        assert_eq!(comments.leading.len(), 1);
        assert_eq!(comments.leading[0].0, 50);
        comments.move_leading(7, 9);
        assert_eq!(comments.leading[0].0, 50);
    }
}
