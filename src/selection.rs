//! Active-field selection with fixed-at-activation colormap slots.
//!
//! At most [`Slot::COUNT`] fields are active at once. A newly activated field
//! takes the slot equal to its position at append time; removing a field
//! never renumbers the others. Toggling a new field while full is a silent
//! no-op.
//!
//! Each effective transition advances the selection [`Generation`].
//! Asynchronous field loads carry the generation they were issued under, so
//! results that arrive after a later toggle can be recognised and dropped.

use crate::colormap::{to_hex, Colormap, Slot};
use crate::field::FieldId;

/// Monotonic counter of selection transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Generation(u64);

impl Generation {
    /// Generation of a freshly created selection.
    pub const INITIAL: Self = Self(0);

    #[must_use]
    fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Raw counter value.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// An active field and the slot it was given on activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveField {
    /// Field identifier.
    pub id: FieldId,
    /// Overlay slot, fixed for as long as the field stays active.
    pub slot: Slot,
}

/// Result of [`Selection::toggle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The field was appended with this slot.
    Activated(Slot),
    /// The field was removed; it had held this slot.
    Deactivated(Slot),
    /// Capacity reached; nothing changed.
    Rejected,
}

impl ToggleOutcome {
    /// Whether the selection changed.
    #[must_use]
    pub fn changed(self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

/// Visual state of one catalogue entry's thumbnail.
#[derive(Debug, Clone, PartialEq)]
pub struct Indicator {
    /// Field identifier.
    pub id: FieldId,
    /// Border color for active fields; `None` when inactive.
    pub border: Option<[f32; 3]>,
}

impl Indicator {
    /// Border color as `#rrggbb`, or `None` when inactive.
    #[must_use]
    pub fn border_hex(&self) -> Option<String> {
        self.border.map(to_hex)
    }
}

/// Ordered set of active fields.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    active: Vec<ActiveField>,
    generation: Generation,
}

impl Selection {
    /// Empty selection at [`Generation::INITIAL`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate `id` if inactive, deactivate it if active.
    pub fn toggle(&mut self, id: &FieldId) -> ToggleOutcome {
        if let Some(pos) = self.active.iter().position(|a| &a.id == id) {
            let removed = self.active.remove(pos);
            self.generation = self.generation.next();
            log::debug!(
                "deactivated '{id}' (slot {}), generation {}",
                removed.slot.index(),
                self.generation.get()
            );
            return ToggleOutcome::Deactivated(removed.slot);
        }

        if self.is_full() {
            log::debug!("selection full; ignoring '{id}'");
            return ToggleOutcome::Rejected;
        }

        // Slot is the append position, even if that collides with a slot
        // still held by an earlier field.
        let Some(slot) = Slot::new(self.active.len()) else {
            return ToggleOutcome::Rejected;
        };
        self.active.push(ActiveField {
            id: id.clone(),
            slot,
        });
        self.generation = self.generation.next();
        log::debug!(
            "activated '{id}' in slot {}, generation {}",
            slot.index(),
            self.generation.get()
        );
        ToggleOutcome::Activated(slot)
    }

    /// Active fields in activation order.
    #[must_use]
    pub fn active(&self) -> &[ActiveField] {
        &self.active
    }

    /// Slot held by `id`, if active.
    #[must_use]
    pub fn slot_of(&self, id: &FieldId) -> Option<Slot> {
        self.active.iter().find(|a| &a.id == id).map(|a| a.slot)
    }

    /// Whether `id` is active.
    #[must_use]
    pub fn is_active(&self, id: &FieldId) -> bool {
        self.slot_of(id).is_some()
    }

    /// Current generation.
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Number of active fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether no field is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Whether another activation would be rejected.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.active.len() >= Slot::COUNT
    }

    /// Indicator state for every catalogue entry. Active entries get their
    /// slot colormap evaluated at `reference`.
    #[must_use]
    pub fn indicators(
        &self,
        catalogue: &[FieldId],
        reference: f32,
    ) -> Vec<Indicator> {
        catalogue
            .iter()
            .map(|id| Indicator {
                id: id.clone(),
                border: self
                    .slot_of(id)
                    .map(|slot| Colormap::for_slot(slot).evaluate(reference)),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(sel: &Selection) -> Vec<(&str, usize)> {
        sel.active()
            .iter()
            .map(|a| (a.id.as_str(), a.slot.index()))
            .collect()
    }

    #[test]
    fn slots_follow_activation_order() {
        let mut sel = Selection::new();
        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            assert_eq!(
                sel.toggle(&FieldId::from(*name)),
                ToggleOutcome::Activated(Slot::new(i).unwrap())
            );
        }
        assert_eq!(ids(&sel), vec![("a", 0), ("b", 1), ("c", 2)]);
    }

    #[test]
    fn fourth_activation_is_a_silent_no_op() {
        let mut sel = Selection::new();
        for name in ["a", "b", "c"] {
            let _ = sel.toggle(&name.into());
        }
        let generation = sel.generation();
        assert_eq!(sel.toggle(&"d".into()), ToggleOutcome::Rejected);
        assert_eq!(ids(&sel), vec![("a", 0), ("b", 1), ("c", 2)]);
        assert_eq!(sel.generation(), generation);
    }

    #[test]
    fn toggle_is_self_inverse() {
        let mut sel = Selection::new();
        let _ = sel.toggle(&"a".into());
        let _ = sel.toggle(&"b".into());
        let before = sel.active().to_vec();

        let _ = sel.toggle(&"c".into());
        let _ = sel.toggle(&"c".into());
        assert_eq!(sel.active(), before.as_slice());

        let _ = sel.toggle(&"b".into());
        let _ = sel.toggle(&"b".into());
        assert_eq!(sel.active(), before.as_slice());
    }

    #[test]
    fn slots_are_not_compacted_on_removal() {
        let mut sel = Selection::new();
        for name in ["a", "b", "c"] {
            let _ = sel.toggle(&name.into());
        }
        assert_eq!(
            sel.toggle(&"b".into()),
            ToggleOutcome::Deactivated(Slot::new(1).unwrap())
        );
        assert_eq!(ids(&sel), vec![("a", 0), ("c", 2)]);

        assert_eq!(
            sel.toggle(&"b".into()),
            ToggleOutcome::Activated(Slot::new(2).unwrap())
        );
        assert_eq!(ids(&sel), vec![("a", 0), ("c", 2), ("b", 2)]);
    }

    #[test]
    fn generation_advances_per_transition() {
        let mut sel = Selection::new();
        assert_eq!(sel.generation(), Generation::INITIAL);
        let _ = sel.toggle(&"a".into());
        let _ = sel.toggle(&"a".into());
        assert_eq!(sel.generation().get(), 2);
    }

    #[test]
    fn indicators_color_only_active_entries() {
        let mut sel = Selection::new();
        let _ = sel.toggle(&"b".into());
        let catalogue = vec![FieldId::from("a"), FieldId::from("b")];
        let ind = sel.indicators(&catalogue, 0.8);
        assert_eq!(ind[0].border, None);
        assert_eq!(ind[1].border, Some(Colormap::Warm.evaluate(0.8)));
        assert_eq!(ind[1].border_hex().as_deref(), Some("#ff0000"));
    }
}
