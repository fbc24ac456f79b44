use std::fmt::Write as _;
use std::io::{self, Read};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Subcommand};
use parking_lot::Mutex;

use crate::config::palette::{format_color, parse_color, ColorPalette};
use crate::config::ConfigPaths;
use crate::display::{display_title, ListRow};
use crate::error::StorageError;
use crate::search::{parse_filter, FilterState};
use crate::storage::{Category, StorageHandle};
use crate::widget::{
    render_widget, RefreshRequest, WidgetBindings, WidgetLines, WidgetRefresher, WidgetView,
};

/// Everything a command needs: the repository and where app state lives.
pub struct Session {
    storage: StorageHandle,
    paths: ConfigPaths,
}

impl Session {
    pub fn new(storage: StorageHandle, paths: ConfigPaths) -> Self {
        Self { storage, paths }
    }

    fn load_bindings(&self) -> Result<WidgetBindings> {
        WidgetBindings::load(&self.paths.widget_bindings)
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Search text; `category:NAME` tokens select a category
    #[arg()]
    pub query: Vec<String>,
    /// Only show notes in this category (overrides `category:` tokens)
    #[arg(long)]
    pub category: Option<String>,
    /// Print notes as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct NewArgs {
    /// Title for the note (prompted if omitted)
    #[arg()]
    pub title: Option<String>,
    /// Provide the note body inline. If omitted, reads from stdin.
    #[arg(long)]
    pub body: Option<String>,
    /// Category for the note (defaults to the default category)
    #[arg(long)]
    pub category: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    /// Note identifier
    pub id: i64,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub body: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// Note identifier
    pub id: i64,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    /// Note identifier
    pub id: i64,
    /// Print the bounded widget summary instead of the full note
    #[arg(long)]
    pub summary: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CategoryCommand {
    /// List categories
    List,
    /// Create a category
    Add(CategoryAddArgs),
    /// Rename and/or recolor a category
    Edit(CategoryEditArgs),
    /// Delete a category, moving its notes to the default category
    Delete(CategoryDeleteArgs),
    /// Show the selectable colors
    Palette,
}

#[derive(Args, Debug, Clone)]
pub struct CategoryAddArgs {
    /// Category name (whitespace trimmed)
    pub name: String,
    /// Color as #RRGGBB or #AARRGGBB
    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CategoryEditArgs {
    /// Category identifier
    pub id: i64,
    /// New name
    #[arg(long)]
    pub name: Option<String>,
    /// New color as #RRGGBB or #AARRGGBB
    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CategoryDeleteArgs {
    /// Category identifier
    pub id: i64,
}

#[derive(Args, Debug, Clone)]
pub struct CategoryArgs {
    #[command(subcommand)]
    pub command: CategoryCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum WidgetCommand {
    /// Show a note on a widget
    Bind(WidgetBindArgs),
    /// Forget a widget's note
    Unbind(WidgetIdArgs),
    /// Render one widget
    Show(WidgetIdArgs),
    /// List the notes a widget can show
    Candidates,
    /// Re-render every bound widget on the background worker
    Refresh,
}

#[derive(Args, Debug, Clone)]
pub struct WidgetBindArgs {
    /// Widget instance identifier
    pub widget_id: i64,
    /// Note identifier
    pub note_id: i64,
}

#[derive(Args, Debug, Clone)]
pub struct WidgetIdArgs {
    /// Widget instance identifier
    pub widget_id: i64,
}

#[derive(Args, Debug, Clone)]
pub struct WidgetArgs {
    #[command(subcommand)]
    pub command: WidgetCommand,
}

pub fn list_notes(session: &Session, args: ListArgs) -> Result<String> {
    let parsed = parse_filter(&args.query.join(" "));
    let mut state = FilterState::default();
    if let Some(category) = args.category.or(parsed.category) {
        state.apply_category(&category);
    }
    if let Some(query) = parsed.query {
        state.set_query(&query);
    }

    let storage = &session.storage;
    let notes = storage
        .list_matching(&state.filter())
        .context("listing notes")?;
    if args.json {
        let mut out = serde_json::to_string_pretty(&notes).context("serialising notes")?;
        out.push('\n');
        return Ok(out);
    }

    let mut out = String::new();
    let _ = writeln!(&mut out, "{}", state.heading());
    if notes.is_empty() {
        let _ = writeln!(&mut out, "{}", state.empty_message());
        return Ok(out);
    }
    for note in &notes {
        let row = ListRow::from_note(
            note,
            storage.timestamp_format(),
            storage.category_color(&note.category),
        );
        let _ = writeln!(&mut out, "{}", row.render());
    }
    Ok(out)
}

pub fn new_note(session: &Session, args: NewArgs) -> Result<String> {
    let storage = &session.storage;
    let title = match args.title {
        Some(t) => t,
        None => prompt("Title")?,
    };
    let title = title.trim().to_owned();
    let body = if let Some(body) = args.body {
        body
    } else {
        read_stdin()?.unwrap_or_default()
    };

    let category = args
        .category
        .unwrap_or_else(|| storage.default_category().to_string());
    let note = storage
        .create_note_in(&title, &body, &category)
        .with_context(|| format!("creating note in '{category}'"))?;
    Ok(format!("Created note #{} in '{}'\n", note.id, note.category))
}

pub fn edit_note(session: &Session, args: EditArgs) -> Result<String> {
    if args.title.is_none() && args.body.is_none() && args.category.is_none() {
        bail!("nothing to change: pass --title, --body or --category");
    }
    let storage = &session.storage;
    let current = storage.get_note(args.id)?;
    let title = args.title.unwrap_or(current.title);
    let body = args.body.unwrap_or(current.body);
    let category = args.category.unwrap_or(current.category);
    let updated = storage
        .update_note(args.id, &title, &body, &category)
        .with_context(|| format!("updating note {}", args.id))?;
    Ok(format!(
        "Updated note #{} ({})\n",
        updated.id,
        display_title(&updated.title)
    ))
}

pub fn delete_note(session: &Session, args: DeleteArgs) -> Result<String> {
    session
        .storage
        .delete_note(args.id)
        .with_context(|| format!("deleting note {}", args.id))?;
    Ok(format!("Deleted note #{}\n", args.id))
}

pub fn show_note(session: &Session, args: ShowArgs) -> Result<String> {
    let storage = &session.storage;
    if args.summary {
        let summary = storage.get_note_summary(args.id)?;
        return Ok(format_widget_lines(
            &WidgetView::Note(summary).lines(),
        ));
    }
    let note = storage.get_note(args.id)?;
    let mut out = String::new();
    let _ = writeln!(&mut out, "#{}  {}", note.id, display_title(&note.title));
    let _ = writeln!(&mut out, "    category {}", note.category);
    let _ = writeln!(
        &mut out,
        "    modified {}",
        storage.timestamp_format().format(note.modified_at)
    );
    let _ = writeln!(
        &mut out,
        "    created  {}",
        storage.timestamp_format().format(note.created_at)
    );
    if !note.body.is_empty() {
        out.push('\n');
        out.push_str(&note.body);
        if !note.body.ends_with('\n') {
            out.push('\n');
        }
    }
    Ok(out)
}

pub fn handle_category_command(session: &Session, args: CategoryArgs) -> Result<String> {
    let storage = &session.storage;
    match args.command {
        CategoryCommand::List => category_list(storage),
        CategoryCommand::Add(args) => category_add(storage, args),
        CategoryCommand::Edit(args) => category_edit(storage, args),
        CategoryCommand::Delete(args) => category_delete(storage, args),
        CategoryCommand::Palette => Ok(category_palette(storage)),
    }
}

fn category_list(storage: &StorageHandle) -> Result<String> {
    let categories = storage.list_categories().context("listing categories")?;
    let mut out = String::new();
    for category in categories {
        let marker = if category.name == storage.default_category() {
            "  (default)"
        } else {
            ""
        };
        let _ = writeln!(
            &mut out,
            "#{:<4} {}  {}{marker}",
            category.id,
            format_color(category.color),
            category.name
        );
    }
    Ok(out)
}

fn category_add(storage: &StorageHandle, args: CategoryAddArgs) -> Result<String> {
    let category = match args.color.as_deref() {
        Some(raw) => storage.create_category_with_color(&args.name, require_color(raw)?),
        None => storage.create_category(&args.name),
    }
    .with_context(|| format!("adding category '{}'", args.name.trim()))?;
    Ok(format!(
        "Added category '{}' (#{}, {})\n",
        category.name,
        category.id,
        format_color(category.color)
    ))
}

fn category_edit(storage: &StorageHandle, args: CategoryEditArgs) -> Result<String> {
    if args.name.is_none() && args.color.is_none() {
        bail!("nothing to change: pass --name or --color");
    }
    let current = find_category(storage, args.id)?;
    let name = args.name.unwrap_or_else(|| current.name.clone());
    let color = match args.color.as_deref() {
        Some(raw) => require_color(raw)?,
        None => current.color,
    };
    let updated = storage
        .update_category(args.id, &name, color)
        .with_context(|| format!("updating category '{}'", current.name))?;
    if updated.name != current.name {
        Ok(format!(
            "Renamed category '{}' to '{}'\n",
            current.name, updated.name
        ))
    } else {
        Ok(format!(
            "Updated category '{}' ({})\n",
            updated.name,
            format_color(updated.color)
        ))
    }
}

fn category_delete(storage: &StorageHandle, args: CategoryDeleteArgs) -> Result<String> {
    let moved = storage
        .delete_category(args.id)
        .with_context(|| format!("deleting category #{}", args.id))?;
    let plural = if moved == 1 { "" } else { "s" };
    Ok(format!(
        "Deleted category #{} (moved {moved} note{plural} to '{}')\n",
        args.id,
        storage.default_category()
    ))
}

fn category_palette(storage: &StorageHandle) -> String {
    let default_color = storage.category_color(storage.default_category());
    let mut out = String::new();
    for color in ColorPalette::default().all() {
        let marker = if Some(color) == default_color {
            "  (default category)"
        } else {
            ""
        };
        let _ = writeln!(&mut out, "{}{marker}", format_color(color));
    }
    out
}

pub fn handle_widget_command(session: &Session, args: WidgetArgs) -> Result<String> {
    match args.command {
        WidgetCommand::Bind(args) => widget_bind(session, args),
        WidgetCommand::Unbind(args) => widget_unbind(session, args),
        WidgetCommand::Show(args) => widget_show(session, args),
        WidgetCommand::Candidates => widget_candidates(session),
        WidgetCommand::Refresh => widget_refresh(session),
    }
}

fn widget_bind(session: &Session, args: WidgetBindArgs) -> Result<String> {
    let note = session.storage.get_note(args.note_id)?;
    let mut bindings = session.load_bindings()?;
    bindings.bind(args.widget_id, note.id)?;
    Ok(format!(
        "Widget {} now shows note #{} ({})\n",
        args.widget_id,
        note.id,
        display_title(&note.title)
    ))
}

fn widget_unbind(session: &Session, args: WidgetIdArgs) -> Result<String> {
    let mut bindings = session.load_bindings()?;
    if bindings.unbind(args.widget_id)? {
        Ok(format!("Widget {} unbound\n", args.widget_id))
    } else {
        Ok(format!("Widget {} was not bound\n", args.widget_id))
    }
}

fn widget_show(session: &Session, args: WidgetIdArgs) -> Result<String> {
    let mut bindings = session.load_bindings()?;
    let view = render_widget(&session.storage, &mut bindings, args.widget_id)?;
    Ok(format_widget(args.widget_id, &view))
}

fn widget_candidates(session: &Session) -> Result<String> {
    let notes = session.storage.list_notes(None, None)?;
    if notes.is_empty() {
        return Ok("No notes to show yet\n".to_string());
    }
    let mut out = String::new();
    for note in notes {
        let _ = writeln!(&mut out, "#{:<5} {}", note.id, display_title(&note.title));
    }
    Ok(out)
}

fn widget_refresh(session: &Session) -> Result<String> {
    let bindings = Arc::new(Mutex::new(session.load_bindings()?));
    let refresher = WidgetRefresher::spawn(session.storage.clone(), bindings)?;
    refresher.request(RefreshRequest::All)?;
    let mut rendered = refresher.shutdown()?;
    if rendered.is_empty() {
        return Ok("No widgets bound\n".to_string());
    }
    rendered.sort_by_key(|item| item.widget_id);
    Ok(rendered
        .iter()
        .map(|item| format_widget(item.widget_id, &item.view))
        .collect())
}

fn format_widget(widget_id: i64, view: &WidgetView) -> String {
    format!(
        "[widget {widget_id}] {}\n{}",
        view.state(),
        format_widget_lines(&view.lines())
    )
}

fn format_widget_lines(lines: &WidgetLines) -> String {
    let mut out = String::new();
    let _ = writeln!(&mut out, "  {}", lines.title);
    if !lines.content.is_empty() {
        let _ = writeln!(&mut out, "  {}", lines.content);
    }
    let footer = [lines.category.as_str(), lines.date.as_str()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("  ");
    if !footer.is_empty() {
        let _ = writeln!(&mut out, "  {footer}");
    }
    out
}

fn find_category(storage: &StorageHandle, category_id: i64) -> Result<Category> {
    storage
        .list_categories()?
        .into_iter()
        .find(|category| category.id == category_id && category_id != 0)
        .ok_or_else(|| anyhow!(StorageError::CategoryNotFound(category_id)))
}

fn require_color(raw: &str) -> Result<u32> {
    parse_color(raw).ok_or_else(|| anyhow!("invalid color '{raw}', expected #RRGGBB or #AARRGGBB"))
}

fn prompt(label: &str) -> Result<String> {
    use std::io::Write;
    let mut stdout = io::stdout();
    write!(stdout, "{}: ", label)?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}
