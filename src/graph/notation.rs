// Notation - timed notes driving audio signal allocation
// Offsets are counted in 16th notes

use serde::{Deserialize, Serialize};

/// A note of the notation
///
/// `x0`/`x1` are start and end offset (16th notes, `x1` exclusive), `y` is
/// the input pad the note plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Note {
    pub x0: u64,
    pub x1: u64,
    pub y: usize,
}

impl Note {
    pub fn new(x0: u64, x1: u64, y: usize) -> Self {
        Self {
            x0,
            x1: x1.max(x0 + 1),
            y,
        }
    }

    /// Duration in 16th notes, at least one
    pub fn duration(&self) -> u64 {
        self.x1.saturating_sub(self.x0).max(1)
    }
}

/// The notes of one audio channel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Notation {
    pub audio_channel: usize,
    notes: Vec<Note>,
}

impl Notation {
    pub fn new(audio_channel: usize) -> Self {
        Self {
            audio_channel,
            notes: Vec::new(),
        }
    }

    /// Take notes as delivered by an importer, order untouched
    pub fn from_notes(audio_channel: usize, notes: Vec<Note>) -> Self {
        Self {
            audio_channel,
            notes,
        }
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Insert keeping ascending `x0`; equal offsets keep insertion order
    pub fn add_note(&mut self, note: Note) {
        let insert_pos = self.notes.partition_point(|n| n.x0 <= note.x0);
        self.notes.insert(insert_pos, note);
    }

    /// Remove the first note starting at `x0` on pad `y`
    pub fn remove_note(&mut self, x0: u64, y: usize) -> Option<Note> {
        let index = self.notes.iter().position(|n| n.x0 == x0 && n.y == y)?;
        Some(self.notes.remove(index))
    }

    /// Move a note to a new offset and pad, keeping its duration
    pub fn move_note(&mut self, x0: u64, y: usize, new_x0: u64, new_y: usize) -> Option<Note> {
        let note = self.remove_note(x0, y)?;
        let moved = Note::new(new_x0, new_x0 + note.duration(), new_y);
        self.add_note(moved);
        Some(moved)
    }

    /// Notes starting exactly at `x0`
    pub fn find_offset(&self, x0: u64) -> impl Iterator<Item = &Note> {
        self.notes.iter().filter(move |n| n.x0 == x0)
    }

    /// Whether start offsets never decrease
    pub fn is_sorted(&self) -> bool {
        self.notes.windows(2).all(|pair| pair[0].x0 <= pair[1].x0)
    }

    /// End offset of the last note
    pub fn end_offset(&self) -> u64 {
        self.notes.iter().map(|n| n.x1).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_note_keeps_order() {
        let mut notation = Notation::new(0);
        notation.add_note(Note::new(4, 5, 1));
        notation.add_note(Note::new(0, 2, 0));
        notation.add_note(Note::new(4, 8, 2));

        let offsets: Vec<_> = notation.notes().iter().map(|n| (n.x0, n.y)).collect();
        assert_eq!(offsets, vec![(0, 0), (4, 1), (4, 2)]);
        assert!(notation.is_sorted());
        assert_eq!(notation.end_offset(), 8);
    }

    #[test]
    fn test_move_note_resorts() {
        let mut notation = Notation::new(0);
        notation.add_note(Note::new(0, 2, 0));
        notation.add_note(Note::new(4, 5, 1));

        let moved = notation.move_note(0, 0, 8, 3).unwrap();

        assert_eq!(moved, Note::new(8, 10, 3));
        assert_eq!(notation.notes()[0].x0, 4);
        assert_eq!(notation.notes()[1], moved);
        assert!(notation.move_note(0, 0, 1, 1).is_none());
    }

    #[test]
    fn test_find_offset() {
        let mut notation = Notation::new(0);
        notation.add_note(Note::new(2, 3, 0));
        notation.add_note(Note::new(2, 4, 1));
        notation.add_note(Note::new(3, 4, 1));

        assert_eq!(notation.find_offset(2).count(), 2);
        assert_eq!(notation.find_offset(5).count(), 0);
    }

    #[test]
    fn test_unsorted_import_detected() {
        let notation = Notation::from_notes(0, vec![Note::new(4, 5, 0), Note::new(1, 2, 0)]);
        assert!(!notation.is_sorted());
    }

    #[test]
    fn test_note_duration_minimum() {
        assert_eq!(Note::new(3, 3, 0).duration(), 1);
        assert_eq!(Note::new(3, 7, 0).duration(), 4);
    }
}
