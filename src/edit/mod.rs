use crate::canvas::{CanvasDocument, ItemId, ListKey};

pub mod notification;

use notification::{compose_notification, NotificationKind};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slot {
    pub list: ListKey,
    pub item: ItemId,
}

impl Slot {
    pub fn new(list: ListKey, item: ItemId) -> Self {
        Self { list, item }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditSession {
    editing: Option<Slot>,
    pending_new_item: Option<Slot>,
}

impl EditSession {
    #[cfg(test)]
    pub fn editing(&self) -> Option<&Slot> {
        self.editing.as_ref()
    }

    pub fn pending_new_item(&self) -> Option<&Slot> {
        self.pending_new_item.as_ref()
    }

    pub fn on_focus(&mut self, slot: &Slot, document: &CanvasDocument) {
        let is_blank = document
            .item(&slot.list, slot.item)
            .is_some_and(|item| item.text().is_empty());
        if is_blank {
            self.editing = Some(slot.clone());
        }
    }

    pub fn on_add(&mut self, slot: Slot) {
        self.pending_new_item = Some(slot.clone());
        self.editing = Some(slot);
    }

    pub fn on_blur_or_commit(&mut self, slot: &Slot, final_value: &str) -> bool {
        if self.editing.as_ref() == Some(slot) {
            self.editing = None;
        }

        let confirms_pending =
            self.pending_new_item.as_ref() == Some(slot) && !final_value.trim().is_empty();
        if confirms_pending {
            self.pending_new_item = None;
        }
        confirms_pending
    }

    // Must run before the item is deleted.
    pub fn on_remove(&mut self, slot: &Slot, removed_value: &str) -> bool {
        if self.editing.as_ref() == Some(slot) {
            self.editing = None;
        }
        if self.pending_new_item.as_ref() == Some(slot) {
            self.pending_new_item = None;
        }
        !removed_value.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditNotification {
    pub kind: NotificationKind,
    pub list: ListKey,
    pub value: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct CanvasEditor {
    document: CanvasDocument,
    session: EditSession,
}

impl CanvasEditor {
    pub fn new(document: CanvasDocument) -> Self {
        Self {
            document,
            session: EditSession::default(),
        }
    }

    pub fn document(&self) -> &CanvasDocument {
        &self.document
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    pub fn slot_at(&self, list: &ListKey, index: usize) -> Option<Slot> {
        self.document
            .lookup_items(list)
            .get(index)
            .map(|item| Slot::new(list.clone(), item.id()))
    }

    pub fn add_item(&mut self, list: &ListKey) -> Option<Slot> {
        let added = self.document.add_item(list)?;
        let slot = Slot::new(list.clone(), added.id);
        self.session.on_add(slot.clone());
        tracing::debug!(
            section = %list.section_id,
            subsection = ?list.subsection,
            index = added.index,
            "item added"
        );
        Some(slot)
    }

    pub fn focus(&mut self, slot: &Slot) {
        self.session.on_focus(slot, &self.document);
    }

    pub fn update_item(&mut self, slot: &Slot, value: impl Into<String>) -> bool {
        self.document
            .update_item_by_id(&slot.list, slot.item, value)
    }

    pub fn commit(&mut self, slot: &Slot) -> Option<EditNotification> {
        let Some(item) = self.document.item(&slot.list, slot.item) else {
            tracing::debug!(section = %slot.list.section_id, "commit ignored, slot no longer exists");
            return None;
        };
        let value = item.text().to_string();
        if !self.session.on_blur_or_commit(slot, &value) {
            return None;
        }

        let remaining = self.document.item_texts(&slot.list);
        Some(self.notification(NotificationKind::Added, &slot.list, value, &remaining))
    }

    pub fn remove_item(&mut self, list: &ListKey, index: usize) -> Option<EditNotification> {
        let slot = self.slot_at(list, index)?;
        let value = self
            .document
            .item(list, slot.item)
            .map(|item| item.text().to_string())
            .unwrap_or_default();
        let notify = self.session.on_remove(&slot, &value);

        let removed = self.document.remove_item(list, index)?;
        if !notify {
            return None;
        }
        Some(self.notification(
            NotificationKind::Removed,
            list,
            removed.value,
            &removed.remaining,
        ))
    }

    fn notification(
        &self,
        kind: NotificationKind,
        list: &ListKey,
        value: String,
        remaining: &[String],
    ) -> EditNotification {
        let message = compose_notification(
            kind,
            self.document.section_title(&list.section_id),
            list.subsection_title(),
            &list.section_id,
            &value,
            remaining,
        );
        tracing::info!(kind = ?kind, section = %list.section_id, "edit notification");
        EditNotification {
            kind,
            list: list.clone(),
            value,
            message,
        }
    }
}
