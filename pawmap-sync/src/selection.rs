//! Selected entity and the visible side panel

use pawmap_api::{Entity, EntityId};

/// Mutually exclusive side panels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Panel {
    #[default]
    None,
    List,
    Card,
    Guide,
}

/// Pending card reveal. Stale once the selection or panel changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealTicket(u64);

#[derive(Debug, Default)]
pub struct SelectionController {
    selected: Option<Entity>,
    panel: Panel,
    card_visible: bool,
    generation: u64,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<&Entity> {
        self.selected.as_ref()
    }

    pub fn selected_id(&self) -> Option<EntityId> {
        self.selected.as_ref().map(|e| e.id)
    }

    pub fn panel(&self) -> Panel {
        self.panel
    }

    /// Whether the card has finished its mount delay and may animate in
    pub fn is_card_visible(&self) -> bool {
        self.card_visible
    }

    fn bump(&mut self) -> RevealTicket {
        self.generation += 1;
        self.card_visible = false;
        RevealTicket(self.generation)
    }

    /// Select an entity: shows the card, closes list and guide.
    ///
    /// The card becomes visible once the returned ticket is passed to
    /// [`SelectionController::reveal`].
    pub fn select(&mut self, entity: Entity) -> RevealTicket {
        tracing::debug!(entity_id = %entity.id, "Entity selected");
        self.selected = Some(entity);
        self.panel = Panel::Card;
        self.bump()
    }

    /// Open the list panel; clears the selection
    pub fn open_list(&mut self) {
        self.selected = None;
        self.panel = Panel::List;
        self.bump();
    }

    /// Open the rescue guide; clears the selection
    pub fn open_guide(&mut self) {
        self.selected = None;
        self.panel = Panel::Guide;
        self.bump();
    }

    /// Close whatever panel is open
    pub fn close(&mut self) {
        self.selected = None;
        self.panel = Panel::None;
        self.bump();
    }

    /// Raise the card visibility flag unless the ticket is stale
    pub fn reveal(&mut self, ticket: RevealTicket) -> bool {
        if ticket.0 != self.generation || self.panel != Panel::Card {
            return false;
        }
        self.card_visible = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::make_entity;
    use pawmap_api::Position;

    fn entity(id: i64) -> Entity {
        make_entity(id, Position::default())
    }

    #[test]
    fn test_select_shows_card_and_closes_list() {
        let mut selection = SelectionController::new();
        selection.open_list();

        selection.select(entity(1));

        assert_eq!(selection.panel(), Panel::Card);
        assert_eq!(selection.selected_id(), Some(EntityId(1)));
    }

    #[test]
    fn test_open_list_clears_selection() {
        let mut selection = SelectionController::new();
        selection.select(entity(1));

        selection.open_list();

        assert_eq!(selection.panel(), Panel::List);
        assert!(selection.selected().is_none());
    }

    #[test]
    fn test_open_guide_clears_selection() {
        let mut selection = SelectionController::new();
        selection.select(entity(1));

        selection.open_guide();

        assert_eq!(selection.panel(), Panel::Guide);
        assert!(selection.selected().is_none());
        assert!(!selection.is_card_visible());
    }

    #[test]
    fn test_reveal_after_select() {
        let mut selection = SelectionController::new();
        let ticket = selection.select(entity(1));
        assert!(!selection.is_card_visible());

        assert!(selection.reveal(ticket));
        assert!(selection.is_card_visible());
    }

    #[test]
    fn test_stale_reveal_is_ignored() {
        let mut selection = SelectionController::new();
        let first = selection.select(entity(1));
        let second = selection.select(entity(2));

        assert!(!selection.reveal(first));
        assert!(!selection.is_card_visible());
        assert!(selection.reveal(second));

        let third = selection.select(entity(3));
        selection.open_list();
        assert!(!selection.reveal(third));
        assert!(!selection.is_card_visible());
    }
}
