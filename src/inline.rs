//! Inline span model and host messages.
//! A translated selection is replaced by a span that shows the translation and
//! swaps back to the original text on each toggle.

use serde::{Deserialize, Serialize};

/// Which side of the span is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shown {
    Original,
    Translated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineTranslation {
    original: String,
    translated: String,
    shown: Shown,
}

impl InlineTranslation {
    /// A fresh span displays the translation.
    pub fn new(original: impl Into<String>, translated: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            translated: translated.into(),
            shown: Shown::Translated,
        }
    }

    pub fn displayed(&self) -> &str {
        match self.shown {
            Shown::Original => &self.original,
            Shown::Translated => &self.translated,
        }
    }

    /// The text not currently on screen.
    pub fn alternate(&self) -> &str {
        match self.shown {
            Shown::Original => &self.translated,
            Shown::Translated => &self.original,
        }
    }

    pub fn shown(&self) -> Shown {
        self.shown
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn translated(&self) -> &str {
        &self.translated
    }

    /// Swap the displayed side. Returns the text now displayed.
    pub fn toggle(&mut self) -> &str {
        self.shown = match self.shown {
            Shown::Original => Shown::Translated,
            Shown::Translated => Shown::Original,
        };
        self.displayed()
    }

    /// Replace the translated side, e.g. after a refresh. Display is unchanged.
    pub fn update_translation(&mut self, translated: impl Into<String>) {
        self.translated = translated.into();
    }
}

/// A user selection as delivered by the page glue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub text: String,
    /// True when the selection sits inside an existing translated span.
    #[serde(default)]
    pub inside_translation: bool,
}

impl Selection {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            inside_translation: false,
        }
    }

    /// Trimmed text worth translating, or None for empty/nested selections.
    pub fn translatable_text(&self) -> Option<&str> {
        if self.inside_translation {
            return None;
        }
        let text = self.text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Messages sent by the extension popup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum HostMessage {
    #[serde(rename_all = "camelCase")]
    UpdateLanguages {
        source_lang: String,
        target_lang: String,
    },
}
