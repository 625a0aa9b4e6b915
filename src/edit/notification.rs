#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Added,
    Removed,
}

impl NotificationKind {
    pub fn verb(self) -> &'static str {
        match self {
            Self::Added => "Added",
            Self::Removed => "Removed",
        }
    }

    fn preposition(self) -> &'static str {
        match self {
            Self::Added => "to",
            Self::Removed => "from",
        }
    }
}

pub fn resolve_title<'a>(
    section_title: Option<&'a str>,
    subsection_title: Option<&'a str>,
    section_id: &'a str,
) -> &'a str {
    subsection_title
        .filter(|title| !title.trim().is_empty())
        .or(section_title.filter(|title| !title.trim().is_empty()))
        .unwrap_or(section_id)
}

pub fn describe_list<S: AsRef<str>>(items: &[S]) -> String {
    let quoted: Vec<String> = items
        .iter()
        .map(|item| item.as_ref().trim())
        .filter(|item| !item.is_empty())
        .map(|item| format!("'{item}'"))
        .collect();
    if quoted.is_empty() {
        "(empty)".to_string()
    } else {
        quoted.join(", ")
    }
}

pub fn compose_notification<S: AsRef<str>>(
    kind: NotificationKind,
    section_title: Option<&str>,
    subsection_title: Option<&str>,
    section_id: &str,
    value: &str,
    remaining: &[S],
) -> String {
    format!(
        "{} '{}' {} {}. Now the list is: {}",
        kind.verb(),
        value.trim(),
        kind.preposition(),
        resolve_title(section_title, subsection_title, section_id),
        describe_list(remaining)
    )
}
