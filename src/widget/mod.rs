//! Home-surface note widgets: each widget instance shows the summary of one
//! bound note and falls back to a placeholder when the note is gone.

use anyhow::Result;
use serde::Serialize;
use strum::IntoStaticStr;

use crate::display::display_title;
use crate::storage::{NoteSummary, StorageHandle};

pub mod bindings;
pub mod refresh;

pub use bindings::WidgetBindings;
pub use refresh::{RefreshRequest, RenderedWidget, WidgetRefresher};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum WidgetView {
    Unconfigured,
    Note(NoteSummary),
    Missing { note_id: i64 },
    Failed { message: String },
}

/// The four text slots of a widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetLines {
    pub title: String,
    pub content: String,
    pub category: String,
    pub date: String,
}

impl WidgetView {
    pub fn state(&self) -> &'static str {
        self.into()
    }

    pub fn lines(&self) -> WidgetLines {
        match self {
            WidgetView::Unconfigured => WidgetLines {
                title: "Tap to configure".into(),
                content: "Choose a note to display".into(),
                category: "Not configured".into(),
                date: String::new(),
            },
            WidgetView::Note(summary) => WidgetLines {
                title: display_title(&summary.title).to_string(),
                content: summary.body.clone(),
                category: summary.category.clone(),
                date: summary.modified.clone(),
            },
            WidgetView::Missing { .. } => WidgetLines {
                title: "Note missing".into(),
                content: "This note may have been deleted".into(),
                category: String::new(),
                date: String::new(),
            },
            WidgetView::Failed { message } => WidgetLines {
                title: "Could not load note".into(),
                content: format!("Error: {message}"),
                category: "Please reconfigure".into(),
                date: String::new(),
            },
        }
    }
}

/// Renders one widget. A binding whose note no longer exists is removed so
/// the widget asks to be configured on the next refresh.
pub fn render_widget(
    storage: &StorageHandle,
    bindings: &mut WidgetBindings,
    widget_id: i64,
) -> Result<WidgetView> {
    let Some(note_id) = bindings.note_for(widget_id) else {
        return Ok(WidgetView::Unconfigured);
    };
    match storage.get_note_summary(note_id) {
        Ok(summary) => Ok(WidgetView::Note(summary)),
        Err(err) if err.is_not_found() => {
            tracing::warn!(widget_id, note_id, "widget note missing, clearing binding");
            bindings.unbind(widget_id)?;
            Ok(WidgetView::Missing { note_id })
        }
        Err(err) => {
            tracing::warn!(widget_id, note_id, error = %err, "failed to load widget note");
            Ok(WidgetView::Failed {
                message: err.to_string(),
            })
        }
    }
}
