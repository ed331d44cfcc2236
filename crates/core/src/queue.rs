//! The live question queue. Follow-ups are spliced in immediately after
//! the index that triggered them; nothing outside the controller gets raw
//! mutation access, only `insert_after`.

#[derive(Debug, Clone)]
struct QueueItem {
    text: String,
    spoken: bool,
    follow_up: bool,
}

#[derive(Debug, Default)]
pub struct QuestionQueue {
    items: Vec<QueueItem>,
}

impl QuestionQueue {
    pub fn new(questions: Vec<String>) -> Self {
        Self {
            items: questions
                .into_iter()
                .map(|text| QueueItem {
                    text,
                    spoken: false,
                    follow_up: false,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn question(&self, index: usize) -> Option<&str> {
        self.items.get(index).map(|item| item.text.as_str())
    }

    pub fn is_follow_up(&self, index: usize) -> bool {
        self.items.get(index).is_some_and(|item| item.follow_up)
    }

    /// The persistent answer slot behind the item at `index`: its rank
    /// among the original questions. Spliced follow-ups have no slot, and
    /// splices never shift the slot of an original question.
    pub fn original_index(&self, index: usize) -> Option<usize> {
        let item = self.items.get(index)?;
        if item.follow_up {
            return None;
        }
        Some(self.items[..index].iter().filter(|i| !i.follow_up).count())
    }

    /// The per-index narration dedup marker. `spoken` stays true for the
    /// lifetime of the item, so re-entering an index never narrates twice.
    pub fn spoken(&self, index: usize) -> bool {
        self.items.get(index).is_some_and(|item| item.spoken)
    }

    pub fn mark_spoken(&mut self, index: usize) {
        if let Some(item) = self.items.get_mut(index) {
            item.spoken = true;
        }
    }

    /// Splices a follow-up in directly after `index`. Length grows by
    /// exactly one; the relative order of every other question is
    /// preserved. An out-of-range index appends at the tail.
    pub fn insert_after(&mut self, index: usize, text: String) {
        let position = (index + 1).min(self.items.len());
        self.items.insert(
            position,
            QueueItem {
                text,
                spoken: false,
                follow_up: true,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> QuestionQueue {
        QuestionQueue::new(vec!["Q1".to_string(), "Q2".to_string(), "Q3".to_string()])
    }

    #[test]
    fn insert_after_grows_by_one_and_preserves_order() {
        let mut queue = queue();
        queue.insert_after(0, "F1".to_string());

        assert_eq!(queue.len(), 4);
        assert_eq!(queue.question(0), Some("Q1"));
        assert_eq!(queue.question(1), Some("F1"));
        assert_eq!(queue.question(2), Some("Q2"));
        assert_eq!(queue.question(3), Some("Q3"));
        assert!(queue.is_follow_up(1));
        assert!(!queue.is_follow_up(2));
    }

    #[test]
    fn insert_after_last_index_appends() {
        let mut queue = queue();
        queue.insert_after(2, "F1".to_string());
        assert_eq!(queue.question(3), Some("F1"));

        queue.insert_after(99, "F2".to_string());
        assert_eq!(queue.question(4), Some("F2"));
    }

    #[test]
    fn repeated_splices_keep_original_relative_order() {
        let mut queue = queue();
        queue.insert_after(0, "F1".to_string());
        queue.insert_after(2, "F2".to_string());

        let texts: Vec<_> = (0..queue.len()).filter_map(|i| queue.question(i)).collect();
        assert_eq!(texts, vec!["Q1", "F1", "Q2", "F2", "Q3"]);
        // Originals still appear as Q1 < Q2 < Q3.
        let q1 = texts.iter().position(|t| *t == "Q1").unwrap();
        let q2 = texts.iter().position(|t| *t == "Q2").unwrap();
        let q3 = texts.iter().position(|t| *t == "Q3").unwrap();
        assert!(q1 < q2 && q2 < q3);
    }

    #[test]
    fn original_index_is_stable_across_splices() {
        let mut queue = queue();
        queue.insert_after(0, "F1".to_string());

        // Queue reads [Q1, F1, Q2, Q3]: originals keep their ranks, the
        // follow-up has none.
        assert_eq!(queue.original_index(0), Some(0));
        assert_eq!(queue.original_index(1), None);
        assert_eq!(queue.original_index(2), Some(1));
        assert_eq!(queue.original_index(3), Some(2));
        assert_eq!(queue.original_index(4), None);
    }

    #[test]
    fn spoken_marker_sticks_to_the_item() {
        let mut queue = queue();
        queue.mark_spoken(0);
        assert!(queue.spoken(0));
        assert!(!queue.spoken(1));

        // A splice after the current index does not disturb the marker.
        queue.insert_after(0, "F1".to_string());
        assert!(queue.spoken(0));
        assert!(!queue.spoken(1));
    }
}
