pub mod export;

pub const MAX_ITEMS: usize = 3;

// Allocated by the owning document, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasItem {
    id: ItemId,
    text: String,
}

impl CanvasItem {
    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListKey {
    pub section_id: String,
    pub subsection: Option<String>,
}

impl ListKey {
    pub fn section(section_id: impl Into<String>) -> Self {
        Self {
            section_id: section_id.into(),
            subsection: None,
        }
    }

    pub fn subsection(section_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            section_id: section_id.into(),
            subsection: Some(title.into()),
        }
    }

    pub fn subsection_title(&self) -> Option<&str> {
        self.subsection.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subsection {
    title: String,
    items: Vec<CanvasItem>,
}

impl Subsection {
    fn empty(title: &str) -> Self {
        Self {
            title: title.to_string(),
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionBody {
    Simple {
        title: String,
        items: Vec<CanvasItem>,
    },
    Composite {
        subsections: [Subsection; 2],
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    id: String,
    display_order: u8,
    body: SectionBody,
}

#[derive(Debug, Clone)]
pub struct SectionList<'a> {
    pub key: ListKey,
    pub title: &'a str,
    pub items: &'a [CanvasItem],
}

impl Section {
    fn simple(id: &str, display_order: u8, title: &str) -> Self {
        Self {
            id: id.to_string(),
            display_order,
            body: SectionBody::Simple {
                title: title.to_string(),
                items: Vec::new(),
            },
        }
    }

    fn composite(id: &str, display_order: u8, titles: [&str; 2]) -> Self {
        Self {
            id: id.to_string(),
            display_order,
            body: SectionBody::Composite {
                subsections: titles.map(Subsection::empty),
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_order(&self) -> u8 {
        self.display_order
    }

    pub fn title(&self) -> Option<&str> {
        match &self.body {
            SectionBody::Simple { title, .. } => Some(title.as_str()),
            SectionBody::Composite { .. } => None,
        }
    }

    pub fn lists(&self) -> Vec<SectionList<'_>> {
        match &self.body {
            SectionBody::Simple { title, items } => vec![SectionList {
                key: ListKey::section(self.id.as_str()),
                title: title.as_str(),
                items: items.as_slice(),
            }],
            SectionBody::Composite { subsections } => subsections
                .iter()
                .map(|subsection| SectionList {
                    key: ListKey::subsection(self.id.as_str(), subsection.title.as_str()),
                    title: subsection.title.as_str(),
                    items: subsection.items.as_slice(),
                })
                .collect(),
        }
    }

    fn list(&self, subsection: Option<&str>) -> Option<&Vec<CanvasItem>> {
        match (&self.body, subsection) {
            (SectionBody::Simple { items, .. }, None) => Some(items),
            (SectionBody::Composite { subsections }, Some(title)) => subsections
                .iter()
                .find(|subsection| subsection.title == title)
                .map(|subsection| &subsection.items),
            _ => None,
        }
    }

    fn list_mut(&mut self, subsection: Option<&str>) -> Option<&mut Vec<CanvasItem>> {
        match (&mut self.body, subsection) {
            (SectionBody::Simple { items, .. }, None) => Some(items),
            (SectionBody::Composite { subsections }, Some(title)) => subsections
                .iter_mut()
                .find(|subsection| subsection.title == title)
                .map(|subsection| &mut subsection.items),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedItem {
    pub index: usize,
    pub id: ItemId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedItem {
    pub value: String,
    pub remaining: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasDocument {
    sections: Vec<Section>,
    next_item_id: u64,
}

impl Default for CanvasDocument {
    fn default() -> Self {
        Self::lean_canvas()
    }
}

impl CanvasDocument {
    pub fn lean_canvas() -> Self {
        Self {
            sections: vec![
                Section::composite("problem", 2, ["Problem", "Existing Alternatives"]),
                Section::simple("solution", 4, "Solution"),
                Section::simple("key-metrics", 8, "Key Metrics"),
                Section::composite(
                    "unique-value-proposition",
                    3,
                    ["Unique Value Proposition", "High Level Concept"],
                ),
                Section::simple("unfair-advantage", 9, "Unfair Advantage"),
                Section::simple("channels", 5, "Channels"),
                Section::composite(
                    "customer-segments",
                    1,
                    ["Customer Segments", "Early Adopter"],
                ),
                Section::simple("cost-structure", 7, "Cost Structure"),
                Section::simple("revenue-streams", 6, "Revenue Streams"),
            ],
            next_item_id: 0,
        }
    }

    fn allocate_id(&mut self) -> ItemId {
        let id = ItemId(self.next_item_id);
        self.next_item_id += 1;
        id
    }

    #[cfg(test)]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, section_id: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.id == section_id)
    }

    pub fn section_title(&self, section_id: &str) -> Option<&str> {
        self.section(section_id).and_then(Section::title)
    }

    fn list(&self, key: &ListKey) -> Option<&Vec<CanvasItem>> {
        self.section(&key.section_id)?.list(key.subsection_title())
    }

    fn list_mut(&mut self, key: &ListKey) -> Option<&mut Vec<CanvasItem>> {
        self.sections
            .iter_mut()
            .find(|section| section.id == key.section_id)?
            .list_mut(key.subsection_title())
    }

    // Unknown keys read as an empty list.
    pub fn lookup_items(&self, key: &ListKey) -> &[CanvasItem] {
        self.list(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn item_texts(&self, key: &ListKey) -> Vec<String> {
        self.lookup_items(key)
            .iter()
            .map(|item| item.text.clone())
            .collect()
    }

    pub fn item(&self, key: &ListKey, id: ItemId) -> Option<&CanvasItem> {
        self.lookup_items(key).iter().find(|item| item.id == id)
    }

    pub fn position_of(&self, key: &ListKey, id: ItemId) -> Option<usize> {
        self.lookup_items(key).iter().position(|item| item.id == id)
    }

    pub fn add_item(&mut self, key: &ListKey) -> Option<AddedItem> {
        let old_len = self.list(key)?.len();
        if old_len >= MAX_ITEMS {
            tracing::debug!(
                section = %key.section_id,
                subsection = ?key.subsection,
                "add ignored, list at capacity"
            );
            return None;
        }

        let id = self.allocate_id();
        self.list_mut(key)?.push(CanvasItem {
            id,
            text: String::new(),
        });
        Some(AddedItem { index: old_len, id })
    }

    pub fn remove_item(&mut self, key: &ListKey, index: usize) -> Option<RemovedItem> {
        let items = self.list_mut(key)?;
        if index >= items.len() {
            tracing::debug!(
                section = %key.section_id,
                subsection = ?key.subsection,
                index,
                "remove ignored, index out of range"
            );
            return None;
        }

        let removed = items.remove(index);
        Some(RemovedItem {
            value: removed.text,
            remaining: items.iter().map(|item| item.text.clone()).collect(),
        })
    }

    pub fn update_item(&mut self, key: &ListKey, index: usize, value: impl Into<String>) -> bool {
        match self.list_mut(key).and_then(|items| items.get_mut(index)) {
            Some(item) => {
                item.text = value.into();
                true
            }
            None => false,
        }
    }

    pub fn update_item_by_id(&mut self, key: &ListKey, id: ItemId, value: impl Into<String>) -> bool {
        match self.position_of(key, id) {
            Some(index) => self.update_item(key, index, value),
            None => false,
        }
    }
}
