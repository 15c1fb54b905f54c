use crossterm::event::{KeyCode, KeyEvent};

use crate::actions::UpgradeOutcome;
use crate::event::{
    self, Command, Movement, is_back, is_help, is_quit, is_refresh, is_search, is_select,
    is_sort_cycle, is_view_cycle,
};
use crate::snapshot::{AppRecord, Snapshot};

/// Which view is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View
{
    Search,
    Updates,
    Tags,
    Bulk,
}

impl View
{
    pub const ALL: [View; 4] = [View::Search, View::Updates, View::Tags, View::Bulk];

    pub fn title(self) -> &'static str
    {
        match self
        {
            View::Search => "Search",
            View::Updates => "Updates",
            View::Tags => "Tags",
            View::Bulk => "Bulk Homebrew",
        }
    }

    pub fn next(self) -> Self
    {
        match self
        {
            View::Search => View::Updates,
            View::Updates => View::Tags,
            View::Tags => View::Bulk,
            View::Bulk => View::Search,
        }
    }
}

/// Application state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppState
{
    Ready,
    Search,              // Typing in the search field
    ActionMenu,          // Overlay listing actions for the selection
    ConfirmBulkUpdate,   // Yes/no before the direct update-all
    Updating(String),    // Description of the task in flight
    Error(String),
    Help,
}

/// Sort orders for the Updates view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder
{
    Source,
    Name,
    NameDesc,
    Developer,
}

impl SortOrder
{
    pub fn label(self) -> &'static str
    {
        match self
        {
            SortOrder::Source => "By Source",
            SortOrder::Name => "By Name (A-Z)",
            SortOrder::NameDesc => "By Name (Z-A)",
            SortOrder::Developer => "By Developer",
        }
    }

    pub fn next(self) -> Self
    {
        match self
        {
            SortOrder::Source => SortOrder::Name,
            SortOrder::Name => SortOrder::NameDesc,
            SortOrder::NameDesc => SortOrder::Developer,
            SortOrder::Developer => SortOrder::Source,
        }
    }
}

/// Which non-name field matched the search query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedField
{
    Developer,
    Memo,
    Tag,
}

impl MatchedField
{
    pub fn label(self) -> &'static str
    {
        match self
        {
            MatchedField::Developer => "developer",
            MatchedField::Memo => "memo",
            MatchedField::Tag => "tag",
        }
    }
}

/// One row of the Search view: an app index plus match markers
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRow
{
    pub app: usize,
    pub matched: Vec<MatchedField>,
}

/// One tag with the indices of the apps carrying it
#[derive(Debug, Clone, PartialEq)]
pub struct TagGroup
{
    pub name: String,
    pub apps: Vec<usize>,
}

/// What a menu entry does when activated
#[derive(Debug, Clone)]
pub enum MenuAction
{
    Dispatch(Command),
    /// Needs the yes/no dialog first; payload is the app count
    ConfirmBulkUpdate(usize),
}

#[derive(Debug, Clone)]
pub struct MenuEntry
{
    pub label: String,
    pub action: MenuAction,
}

/// Action menu overlay state
#[derive(Debug, Clone)]
pub struct ActionMenu
{
    pub title: String,
    pub entries: Vec<MenuEntry>,
    pub selected: usize,
}

impl ActionMenu
{
    pub fn select_prev(&mut self)
    {
        if self.selected > 0
        {
            self.selected -= 1;
        }
    }

    pub fn select_next(&mut self)
    {
        if !self.entries.is_empty() && self.selected < self.entries.len() - 1
        {
            self.selected += 1;
        }
    }
}

/// Spinner frames for task animation
const SPINNER_FRAMES: &[char] = &[ '⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏' ];

/// Main application struct
pub struct App
{
    pub state: AppState,
    pub view: View,

    /// Latest valid snapshot; retained across transient read failures
    pub snapshot: Option<Snapshot>,
    /// Whether the one-time "no data yet" notice was already shown
    pub data_missing_notice: bool,

    // Search view
    pub search_query: String,
    pub search_cursor: usize,           // Cursor position in search input

    // Updates view
    pub sort_order: SortOrder,

    // Tags view drill-down
    pub selected_tag: Option<String>,

    // List cursor (reset on view switches and filter changes)
    pub cursor: usize,
    pub scroll: usize,

    // Action menu overlay
    pub action_menu: Option<ActionMenu>,

    // Bulk confirmation dialog
    pub bulk_count: usize,
    pub confirm_yes: bool,

    // Status message
    pub status_message: Option<String>,

    // Spinner state
    pub spinner_frame: usize,

    // Visible height for scroll calculations (updated by UI)
    pub visible_height: usize,

    pub should_quit: bool,
}

impl App
{
    pub fn new() -> Self
    {
        Self {
            state: AppState::Ready,
            view: View::Search,
            snapshot: None,
            data_missing_notice: false,
            search_query: String::new(),
            search_cursor: 0,
            sort_order: SortOrder::Source,
            selected_tag: None,
            cursor: 0,
            scroll: 0,
            action_menu: None,
            bulk_count: 0,
            confirm_yes: true,
            status_message: None,
            spinner_frame: 0,
            visible_height: 20,
            should_quit: false,
        }
    }

    /// Advance spinner animation
    pub fn tick_spinner(&mut self)
    {
        self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAMES.len();
    }

    /// Get current spinner character
    pub fn spinner_char(&self) -> char
    {
        SPINNER_FRAMES[self.spinner_frame]
    }

    /// Swap in a newly ingested snapshot, keeping the cursor in range.
    /// The held snapshot is only ever replaced wholesale, never edited.
    pub fn set_snapshot(&mut self,
                        snapshot: Snapshot)
    {
        self.snapshot = Some(snapshot);
        self.status_message = None;
        self.clamp_to_rows();
    }

    /// A poll found no readable file. Keep what we already hold; only
    /// mention the absence once, before any data has ever loaded.
    pub fn note_absent(&mut self)
    {
        if self.snapshot.is_none() && !self.data_missing_notice
        {
            self.data_missing_notice = true;
            self.status_message =
                Some("Vesslo data not found. Run the Vesslo app to export it.".to_string());
        }
    }

    /// Set error state
    pub fn set_error(&mut self,
                     message: String)
    {
        self.state = AppState::Error(message);
    }

    /// Set status message
    pub fn set_status(&mut self,
                      message: String)
    {
        self.status_message = Some(message);
    }

    /// Record the outcome of a captured upgrade task.
    pub fn finish_upgrade(&mut self,
                          label: &str,
                          result: Result<UpgradeOutcome, String>)
    {
        match result
        {
            Ok(UpgradeOutcome::Updated(output)) =>
            {
                self.state = AppState::Ready;
                let detail = output.lines().last().unwrap_or("Update complete");
                self.set_status(format!("{} updated. {}", label, detail));
            }
            Ok(UpgradeOutcome::AlreadyUpToDate) =>
            {
                self.state = AppState::Ready;
                self.set_status(format!("{} already up to date", label));
            }
            Err(message) =>
            {
                self.set_error(format!("Failed to update {}: {}", label, message));
            }
        }
    }

    /// Handle a key event and return an optional command to execute
    pub fn handle_key(&mut self,
                      key: KeyEvent)
                      -> Option<Command>
    {
        let code = key.code;

        // Overlay states eat their own keys
        if self.state == AppState::Search
        {
            return self.handle_search_key(code);
        }
        if self.state == AppState::ActionMenu
        {
            return self.handle_action_menu_key(code);
        }
        if self.state == AppState::ConfirmBulkUpdate
        {
            return self.handle_confirm_key(code);
        }

        // Handle global keys first
        if is_quit(code)
        {
            if self.state == AppState::Help
            {
                self.state = AppState::Ready;
                return None;
            }
            self.should_quit = true;
            return Some(Command::Quit);
        }

        if is_help(code)
        {
            self.state = if self.state == AppState::Help
            {
                AppState::Ready
            }
            else
            {
                AppState::Help
            };
            return None;
        }

        // Don't process keys while help is open or a task is running
        if matches!(self.state, AppState::Help | AppState::Updating(_))
        {
            return None;
        }

        // Clear error state on any key
        if let AppState::Error(_) = &self.state
        {
            self.state = AppState::Ready;
        }

        // Handle movement (including vi-style Ctrl keys)
        if let Some(movement) = event::key_to_movement(&key)
        {
            self.apply_movement(movement);
            return None;
        }

        // Direct view switch (1-4) or cycle (Tab)
        if let Some(index) = event::view_index(code)
        {
            self.switch_view(View::ALL[index]);
            return None;
        }
        if is_view_cycle(code)
        {
            self.switch_view(self.view.next());
            return None;
        }

        if is_select(code)
        {
            return self.select_item();
        }

        if is_back(code)
        {
            self.go_back();
            return None;
        }

        if is_search(code) && self.view == View::Search
        {
            self.start_search();
            return None;
        }

        if is_sort_cycle(code) && self.view == View::Updates
        {
            self.sort_order = self.sort_order.next();
            self.reset_cursor();
            return None;
        }

        if is_refresh(code)
        {
            return Some(Command::Refresh);
        }

        None
    }

    /// Apply a movement to the current list
    fn apply_movement(&mut self,
                      movement: Movement)
    {
        let count = self.row_count();
        if count == 0
        {
            return;
        }

        let max = count - 1;
        let visible_height = self.visible_height;
        let delta: i32 = match movement
        {
            Movement::Up(n) => -n,
            Movement::Down(n) => n,
            Movement::PageUp => -(visible_height as i32),
            Movement::PageDown => visible_height as i32,
            Movement::HalfPageUp => -(visible_height as i32 / 2).max(1),
            Movement::HalfPageDown => (visible_height as i32 / 2).max(1),
            Movement::Top => i32::MIN,
            Movement::Bottom => i32::MAX,
        };

        self.cursor = Self::clamp_cursor(self.cursor, delta, max);
    }

    fn clamp_cursor(current: usize,
                    delta: i32,
                    max: usize)
                    -> usize
    {
        if delta == i32::MIN
        {
            return 0;
        }
        if delta == i32::MAX
        {
            return max;
        }

        let new_pos = current as i32 + delta;
        new_pos.clamp(0, max as i32) as usize
    }

    /// Switch views; each view starts at the top of its list
    fn switch_view(&mut self,
                   view: View)
    {
        self.view = view;
        self.selected_tag = None;
        self.reset_cursor();
    }

    fn reset_cursor(&mut self)
    {
        self.cursor = 0;
        self.scroll = 0;
    }

    /// Keep the cursor valid after the row list changed underneath it
    fn clamp_to_rows(&mut self)
    {
        let count = self.row_count();
        if count == 0
        {
            self.reset_cursor();
        }
        else if self.cursor >= count
        {
            self.cursor = count - 1;
        }
    }

    /// Start incremental search
    fn start_search(&mut self)
    {
        self.search_query.clear();
        self.search_cursor = 0;
        self.reset_cursor();
        self.state = AppState::Search;
    }

    /// Handle key events in search mode
    fn handle_search_key(&mut self,
                         key: KeyCode)
                         -> Option<Command>
    {
        match key
        {
            // Cancel search, clear filter
            KeyCode::Esc =>
            {
                self.search_query.clear();
                self.search_cursor = 0;
                self.reset_cursor();
                self.state = AppState::Ready;
            }

            // Confirm search, keep filter active
            KeyCode::Enter =>
            {
                self.state = AppState::Ready;
            }

            // Navigate the filtered list while typing
            KeyCode::Up =>
            {
                self.apply_movement(Movement::Up(1));
            }
            KeyCode::Down =>
            {
                self.apply_movement(Movement::Down(1));
            }

            // Text editing
            KeyCode::Backspace =>
            {
                if self.search_cursor > 0
                {
                    self.search_cursor -= 1;
                    self.search_query.remove(self.search_cursor);
                    self.reset_cursor();
                }
            }
            KeyCode::Delete =>
            {
                if self.search_cursor < self.search_query.len()
                {
                    self.search_query.remove(self.search_cursor);
                    self.reset_cursor();
                }
            }
            KeyCode::Left =>
            {
                if self.search_cursor > 0
                {
                    self.search_cursor -= 1;
                }
            }
            KeyCode::Right =>
            {
                if self.search_cursor < self.search_query.len()
                {
                    self.search_cursor += 1;
                }
            }
            KeyCode::Home =>
            {
                self.search_cursor = 0;
            }
            KeyCode::End =>
            {
                self.search_cursor = self.search_query.len();
            }

            // Character input
            KeyCode::Char(c) =>
            {
                self.search_query.insert(self.search_cursor, c);
                self.search_cursor += 1;
                self.reset_cursor();
            }

            _ => {}
        }

        None
    }

    /// Handle key events in the action menu overlay
    fn handle_action_menu_key(&mut self,
                              key: KeyCode)
                              -> Option<Command>
    {
        let menu = match &mut self.action_menu
        {
            Some(menu) => menu,
            None =>
            {
                self.state = AppState::Ready;
                return None;
            }
        };

        match key
        {
            KeyCode::Esc | KeyCode::Char('q') =>
            {
                self.action_menu = None;
                self.state = AppState::Ready;
            }
            KeyCode::Up | KeyCode::Char('k') =>
            {
                menu.select_prev();
            }
            KeyCode::Down | KeyCode::Char('j') =>
            {
                menu.select_next();
            }
            KeyCode::Enter =>
            {
                let action = menu.entries.get(menu.selected).map(|e| e.action.clone());
                self.action_menu = None;
                self.state = AppState::Ready;

                match action
                {
                    Some(MenuAction::Dispatch(cmd)) =>
                    {
                        self.prepare_dispatch(&cmd);
                        return Some(cmd);
                    }
                    Some(MenuAction::ConfirmBulkUpdate(count)) =>
                    {
                        self.bulk_count = count;
                        self.confirm_yes = true;
                        self.state = AppState::ConfirmBulkUpdate;
                    }
                    None => {}
                }
            }
            _ => {}
        }

        None
    }

    /// Handle key events in the bulk update confirmation dialog
    fn handle_confirm_key(&mut self,
                          key: KeyCode)
                          -> Option<Command>
    {
        match key
        {
            KeyCode::Esc | KeyCode::Char('n') =>
            {
                self.state = AppState::Ready;
            }
            KeyCode::Left | KeyCode::Right | KeyCode::Tab =>
            {
                self.confirm_yes = !self.confirm_yes;
            }
            KeyCode::Char('y') =>
            {
                return self.confirm_bulk_update();
            }
            KeyCode::Enter =>
            {
                if self.confirm_yes
                {
                    return self.confirm_bulk_update();
                }
                self.state = AppState::Ready;
            }
            _ => {}
        }

        None
    }

    fn confirm_bulk_update(&mut self) -> Option<Command>
    {
        let cmd = Command::BrewUpgradeAll { count: self.bulk_count };
        self.prepare_dispatch(&cmd);
        Some(cmd)
    }

    /// Set the in-flight/status presentation for a command about to run
    fn prepare_dispatch(&mut self,
                        cmd: &Command)
    {
        match cmd
        {
            Command::BrewUpgrade { name, .. } =>
            {
                self.state = AppState::Updating(format!("Updating {}", name));
            }
            Command::BrewUpgradeAll { count } =>
            {
                self.state = AppState::Updating(format!("Updating {} Homebrew apps", count));
            }
            Command::MasUpgrade { name, .. } =>
            {
                self.state = AppState::Updating(format!("Updating {}", name));
            }
            Command::UpdateInVesslo { name, .. } =>
            {
                self.set_status(format!("Handed {} to Vesslo", name));
            }
            Command::UpdateAllInVesslo =>
            {
                self.set_status("Batch update started in Vesslo".to_string());
            }
            Command::CopyBundleId { bundle_id } =>
            {
                self.set_status(format!("Copied {}", bundle_id));
            }
            _ => {}
        }
    }

    /// Open the action menu for the current selection, or drill into a tag
    fn select_item(&mut self) -> Option<Command>
    {
        match self.view
        {
            View::Tags if self.selected_tag.is_none() =>
            {
                let groups = self.tag_groups();
                if let Some(group) = groups.get(self.cursor)
                {
                    self.selected_tag = Some(group.name.clone());
                    self.reset_cursor();
                }
                None
            }
            View::Bulk if self.cursor == 0 =>
            {
                let count = self.bulk_rows().len();
                if count > 0
                {
                    self.action_menu = Some(update_all_menu(count));
                    self.state = AppState::ActionMenu;
                }
                None
            }
            _ =>
            {
                let menu = self.selected_app().map(app_menu);
                if let Some(menu) = menu
                {
                    self.action_menu = Some(menu);
                    self.state = AppState::ActionMenu;
                }
                None
            }
        }
    }

    /// Navigate back out of a drill-down or active filter
    fn go_back(&mut self)
    {
        match self.view
        {
            View::Tags if self.selected_tag.is_some() =>
            {
                self.selected_tag = None;
                self.reset_cursor();
            }
            View::Search if !self.search_query.is_empty() =>
            {
                self.search_query.clear();
                self.search_cursor = 0;
                self.reset_cursor();
            }
            _ => {}
        }
    }

    /// Number of selectable rows in the current view
    pub fn row_count(&self) -> usize
    {
        match self.view
        {
            View::Search => self.search_rows().len(),
            View::Updates => self.update_rows().len(),
            View::Tags => match &self.selected_tag
            {
                Some(tag) => self.apps_with_tag(tag).len(),
                None => self.tag_groups().len(),
            },
            View::Bulk =>
            {
                let apps = self.bulk_rows().len();
                // Row 0 is the synthetic "Update All" entry
                if apps == 0 { 0 } else { apps + 1 }
            }
        }
    }

    /// The record the cursor is on, if it is on one
    pub fn selected_app(&self) -> Option<&AppRecord>
    {
        let apps = &self.snapshot.as_ref()?.apps;
        let index = match self.view
        {
            View::Search => self.search_rows().get(self.cursor)?.app,
            View::Updates => *self.update_rows().get(self.cursor)?,
            View::Tags =>
            {
                let tag = self.selected_tag.as_ref()?;
                *self.apps_with_tag(tag).get(self.cursor)?
            }
            View::Bulk =>
            {
                if self.cursor == 0
                {
                    return None;
                }
                *self.bulk_rows().get(self.cursor - 1)?
            }
        };
        apps.get(index)
    }

    /// Search view rows: apps matching the query by name, developer,
    /// memo or tag, with markers for the non-name fields that hit
    pub fn search_rows(&self) -> Vec<SearchRow>
    {
        let apps = match &self.snapshot
        {
            Some(snapshot) => &snapshot.apps,
            None => return Vec::new(),
        };

        let query = self.search_query.to_lowercase();

        apps.iter()
            .enumerate()
            .filter_map(|(i, app)| {
                if query.is_empty()
                {
                    return Some(SearchRow { app: i, matched: Vec::new() });
                }

                let mut matched = Vec::new();
                if app.developer
                      .as_ref()
                      .is_some_and(|d| d.to_lowercase().contains(&query))
                {
                    matched.push(MatchedField::Developer);
                }
                if app.memo.as_ref().is_some_and(|m| m.to_lowercase().contains(&query))
                {
                    matched.push(MatchedField::Memo);
                }
                if app.tags.iter().any(|t| t.to_lowercase().contains(&query))
                {
                    matched.push(MatchedField::Tag);
                }

                let name_hit = app.name.to_lowercase().contains(&query);
                if name_hit || !matched.is_empty()
                {
                    Some(SearchRow { app: i, matched })
                }
                else
                {
                    None
                }
            })
            .collect()
    }

    /// Updates view rows: apps with a pending update, ordered per sort
    pub fn update_rows(&self) -> Vec<usize>
    {
        let apps = match &self.snapshot
        {
            Some(snapshot) => &snapshot.apps,
            None => return Vec::new(),
        };

        let mut rows: Vec<usize> = apps.iter()
                                       .enumerate()
                                       .filter(|(_, app)| app.has_pending_update())
                                       .map(|(i, _)| i)
                                       .collect();

        match self.sort_order
        {
            SortOrder::Source => rows = group_by_source(apps, rows),
            SortOrder::Name =>
            {
                rows.sort_by(|&a, &b| {
                        apps[a].name.to_lowercase().cmp(&apps[b].name.to_lowercase())
                    });
            }
            SortOrder::NameDesc =>
            {
                rows.sort_by(|&a, &b| {
                        apps[b].name.to_lowercase().cmp(&apps[a].name.to_lowercase())
                    });
            }
            SortOrder::Developer =>
            {
                rows.sort_by(|&a, &b| {
                        let da = apps[a].developer.as_deref().unwrap_or("").to_lowercase();
                        let db = apps[b].developer.as_deref().unwrap_or("").to_lowercase();
                        da.cmp(&db)
                    });
            }
        }

        rows
    }

    /// Tag view rows: every tag with its apps, most-used first.
    /// Ties keep first-seen order; tags are not deduplicated per app,
    /// matching what the writer produced.
    pub fn tag_groups(&self) -> Vec<TagGroup>
    {
        let apps = match &self.snapshot
        {
            Some(snapshot) => &snapshot.apps,
            None => return Vec::new(),
        };

        let mut groups: Vec<TagGroup> = Vec::new();
        for (i, app) in apps.iter().enumerate()
        {
            for tag in &app.tags
            {
                match groups.iter_mut().find(|g| g.name == *tag)
                {
                    Some(group) => group.apps.push(i),
                    None => groups.push(TagGroup {
                        name: tag.clone(),
                        apps: vec![i],
                    }),
                }
            }
        }

        groups.sort_by(|a, b| b.apps.len().cmp(&a.apps.len()));
        groups
    }

    pub fn apps_with_tag(&self,
                         tag: &str)
                         -> Vec<usize>
    {
        self.tag_groups()
            .into_iter()
            .find(|g| g.name == tag)
            .map(|g| g.apps)
            .unwrap_or_default()
    }

    /// Bulk view rows: Brew-sourced pending updates that carry a cask
    pub fn bulk_rows(&self) -> Vec<usize>
    {
        let apps = match &self.snapshot
        {
            Some(snapshot) => &snapshot.apps,
            None => return Vec::new(),
        };

        apps.iter()
            .enumerate()
            .filter(|(_, app)| {
                app.is_homebrew() && app.has_pending_update() && app.homebrew_cask.is_some()
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Adjust scroll offset to keep cursor visible
    pub fn adjust_scroll(&mut self,
                         visible_height: usize)
    {
        if visible_height == 0
        {
            return;
        }

        if self.cursor < self.scroll
        {
            self.scroll = self.cursor;
        }
        else if self.cursor >= self.scroll + visible_height
        {
            self.scroll = self.cursor - visible_height + 1;
        }
    }
}

impl Default for App
{
    fn default() -> Self
    {
        Self::new()
    }
}

/// Stable partition of update rows into source groups: Homebrew first,
/// then Sparkle, then App Store, then everything else. An app lands in
/// the first group it qualifies for; writer order holds within a group.
fn group_by_source(apps: &[AppRecord],
                   rows: Vec<usize>)
                   -> Vec<usize>
{
    let mut brew = Vec::new();
    let mut sparkle = Vec::new();
    let mut app_store = Vec::new();
    let mut other = Vec::new();

    for i in rows
    {
        let app = &apps[i];
        if app.is_homebrew()
        {
            brew.push(i);
        }
        else if app.is_sparkle()
        {
            sparkle.push(i);
        }
        else if app.is_app_store()
        {
            app_store.push(i);
        }
        else
        {
            other.push(i);
        }
    }

    brew.extend(sparkle);
    brew.extend(app_store);
    brew.extend(other);
    brew
}

/// Build the action menu for one app. Only actions the record can
/// actually serve are listed; update actions come first when pending.
fn app_menu(app: &AppRecord) -> ActionMenu
{
    let mut entries = Vec::new();

    if app.has_pending_update()
    {
        if let Some(bundle_id) = &app.bundle_id
        {
            entries.push(MenuEntry {
                label: "Update in Vesslo".to_string(),
                action: MenuAction::Dispatch(Command::UpdateInVesslo {
                    bundle_id: bundle_id.clone(),
                    name: app.name.clone(),
                }),
            });
        }
        if app.is_homebrew()
        {
            if let Some(cask) = &app.homebrew_cask
            {
                entries.push(MenuEntry {
                    label: "Update via Homebrew".to_string(),
                    action: MenuAction::Dispatch(Command::BrewUpgrade {
                        cask: cask.clone(),
                        name: app.name.clone(),
                    }),
                });
                entries.push(MenuEntry {
                    label: "Update in Terminal (brew)".to_string(),
                    action: MenuAction::Dispatch(Command::BrewUpgradeInTerminal {
                        cask: cask.clone(),
                    }),
                });
            }
        }
        if app.is_app_store()
        {
            if let Some(app_store_id) = &app.app_store_id
            {
                entries.push(MenuEntry {
                    label: "Open App Store Page".to_string(),
                    action: MenuAction::Dispatch(Command::OpenAppStorePage {
                        app_store_id: app_store_id.clone(),
                    }),
                });
                entries.push(MenuEntry {
                    label: "Update via mas".to_string(),
                    action: MenuAction::Dispatch(Command::MasUpgrade {
                        app_store_id: app_store_id.clone(),
                        name: app.name.clone(),
                    }),
                });
                entries.push(MenuEntry {
                    label: "Update in Terminal (mas)".to_string(),
                    action: MenuAction::Dispatch(Command::MasUpgradeInTerminal {
                        app_store_id: app_store_id.clone(),
                    }),
                });
            }
        }
    }

    entries.push(MenuEntry {
        label: "Open App".to_string(),
        action: MenuAction::Dispatch(Command::OpenApp { path: app.path.clone() }),
    });
    entries.push(MenuEntry {
        label: "Reveal in Finder".to_string(),
        action: MenuAction::Dispatch(Command::RevealInFinder { path: app.path.clone() }),
    });

    if let Some(bundle_id) = &app.bundle_id
    {
        entries.push(MenuEntry {
            label: "Open in Vesslo".to_string(),
            action: MenuAction::Dispatch(Command::OpenInVesslo {
                bundle_id: bundle_id.clone(),
            }),
        });
        entries.push(MenuEntry {
            label: "Copy Bundle ID".to_string(),
            action: MenuAction::Dispatch(Command::CopyBundleId {
                bundle_id: bundle_id.clone(),
            }),
        });
    }

    ActionMenu {
        title: app.name.clone(),
        entries,
        selected: 0,
    }
}

/// Menu behind the synthetic "Update All" row of the Bulk view
fn update_all_menu(count: usize) -> ActionMenu
{
    ActionMenu {
        title: format!("Update All ({} apps)", count),
        entries: vec![
            MenuEntry {
                label: "Update All in Vesslo".to_string(),
                action: MenuAction::Dispatch(Command::UpdateAllInVesslo),
            },
            MenuEntry {
                label: "Quick Update All (Direct)".to_string(),
                action: MenuAction::ConfirmBulkUpdate(count),
            },
        ],
        selected: 0,
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::snapshot::{SOURCE_APP_STORE, SOURCE_BREW, SOURCE_SPARKLE};

    fn record(id: &str,
              name: &str)
              -> AppRecord
    {
        AppRecord {
            id: id.to_string(),
            name: name.to_string(),
            path: format!("/Applications/{}.app", name),
            ..Default::default()
        }
    }

    fn app_with(records: Vec<AppRecord>) -> App
    {
        let mut app = App::new();
        app.set_snapshot(Snapshot {
            exported_at: "2024-06-01T10:00:00Z".to_string(),
            update_count: 0,
            apps: records,
        });
        app
    }

    #[test]
    fn search_matches_name_and_marks_other_fields()
    {
        let mut alpha = record("1", "Alpha");
        alpha.developer = Some("Acme".to_string());
        let mut beta = record("2", "Beta");
        beta.memo = Some("bought from acme store".to_string());
        let mut gamma = record("3", "Gamma");
        gamma.tags = vec!["acmetools".to_string()];
        let delta = record("4", "Delta");

        let mut app = app_with(vec![alpha, beta, gamma, delta]);
        app.search_query = "acme".to_string();

        let rows = app.search_rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].matched, vec![MatchedField::Developer]);
        assert_eq!(rows[1].matched, vec![MatchedField::Memo]);
        assert_eq!(rows[2].matched, vec![MatchedField::Tag]);
    }

    #[test]
    fn name_match_alone_carries_no_markers()
    {
        let app_records = vec![record("1", "Alpha"), record("2", "Beta")];
        let mut app = app_with(app_records);
        app.search_query = "alp".to_string();

        let rows = app.search_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].app, 0);
        assert!(rows[0].matched.is_empty());
    }

    #[test]
    fn empty_query_lists_every_app()
    {
        let app = app_with(vec![record("1", "Alpha"), record("2", "Beta")]);
        assert_eq!(app.search_rows().len(), 2);
    }

    fn pending(id: &str,
               name: &str,
               sources: &[&str])
               -> AppRecord
    {
        let mut r = record(id, name);
        r.target_version = Some("9.9".to_string());
        r.sources = sources.iter().map(|s| s.to_string()).collect();
        r
    }

    #[test]
    fn updates_view_only_lists_pending_updates()
    {
        let mut current = record("1", "Current");
        current.target_version = Some("  ".to_string());
        let records = vec![current, pending("2", "Stale", &[])];

        let app = app_with(records);
        assert_eq!(app.update_rows(), vec![1]);
    }

    #[test]
    fn source_grouping_orders_brew_sparkle_appstore_manual()
    {
        let records = vec![
            pending("1", "Manual", &[]),
            pending("2", "Store", &[SOURCE_APP_STORE]),
            pending("3", "Cask", &[SOURCE_BREW]),
            pending("4", "Feed", &[SOURCE_SPARKLE]),
            pending("5", "CaskAndFeed", &[SOURCE_SPARKLE, SOURCE_BREW]),
        ];

        let app = app_with(records);
        // Brew group keeps writer order, then Sparkle, App Store, rest
        assert_eq!(app.update_rows(), vec![2, 4, 3, 1, 0]);
    }

    #[test]
    fn name_sorts_are_case_insensitive_and_reversible()
    {
        let records = vec![
            pending("1", "banana", &[]),
            pending("2", "Apple", &[]),
            pending("3", "cherry", &[]),
        ];

        let mut app = app_with(records);
        app.sort_order = SortOrder::Name;
        assert_eq!(app.update_rows(), vec![1, 0, 2]);

        app.sort_order = SortOrder::NameDesc;
        assert_eq!(app.update_rows(), vec![2, 0, 1]);
    }

    #[test]
    fn developer_sort_treats_missing_developer_as_empty()
    {
        let mut a = pending("1", "A", &[]);
        a.developer = Some("Zeta".to_string());
        let b = pending("2", "B", &[]);
        let mut c = pending("3", "C", &[]);
        c.developer = Some("Acme".to_string());

        let mut app = app_with(vec![a, b, c]);
        app.sort_order = SortOrder::Developer;
        assert_eq!(app.update_rows(), vec![1, 2, 0]);
    }

    #[test]
    fn tag_groups_count_apps_and_sort_by_usage()
    {
        let mut a = record("1", "A");
        a.tags = vec!["work".to_string()];
        let mut b = record("2", "B");
        b.tags = vec!["media".to_string(), "work".to_string()];
        let mut c = record("3", "C");
        c.tags = vec!["work".to_string()];

        let app = app_with(vec![a, b, c]);
        let groups = app.tag_groups();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "work");
        assert_eq!(groups[0].apps, vec![0, 1, 2]);
        assert_eq!(groups[1].name, "media");
        assert_eq!(groups[1].apps, vec![1]);
    }

    #[test]
    fn bulk_view_requires_brew_source_pending_update_and_cask()
    {
        let with_cask = {
            let mut r = pending("1", "Cask", &[SOURCE_BREW]);
            r.homebrew_cask = Some("cask".to_string());
            r
        };
        let no_cask = pending("2", "NoCask", &[SOURCE_BREW]);
        let not_pending = {
            let mut r = record("3", "Fresh");
            r.sources = vec![SOURCE_BREW.to_string()];
            r.homebrew_cask = Some("fresh".to_string());
            r
        };

        let mut app = app_with(vec![with_cask, no_cask, not_pending]);
        app.view = View::Bulk;
        assert_eq!(app.bulk_rows(), vec![0]);
        // Synthetic "Update All" row on top of the single app row
        assert_eq!(app.row_count(), 2);
    }

    #[test]
    fn action_menu_lists_only_applicable_actions()
    {
        let mut r = pending("1", "Cask", &[SOURCE_BREW]);
        r.homebrew_cask = Some("cask".to_string());
        r.bundle_id = Some("com.acme.cask".to_string());

        let menu = app_menu(&r);
        let labels: Vec<&str> = menu.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels,
                   vec![
                       "Update in Vesslo",
                       "Update via Homebrew",
                       "Update in Terminal (brew)",
                       "Open App",
                       "Reveal in Finder",
                       "Open in Vesslo",
                       "Copy Bundle ID",
                   ]);
    }

    #[test]
    fn action_menu_without_identifiers_keeps_the_basics()
    {
        let menu = app_menu(&record("1", "Plain"));
        let labels: Vec<&str> = menu.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["Open App", "Reveal in Finder"]);
    }

    #[test]
    fn absence_keeps_the_previous_snapshot()
    {
        let mut app = app_with(vec![record("1", "A")]);
        app.note_absent();

        assert!(app.snapshot.is_some());
        assert_eq!(app.row_count(), 1);
        // Notice only fires before any data ever loaded
        assert!(app.status_message.is_none());
    }

    #[test]
    fn absence_before_first_data_notes_once()
    {
        let mut app = App::new();
        app.note_absent();
        assert!(app.status_message.is_some());

        app.status_message = None;
        app.note_absent();
        assert!(app.status_message.is_none());
    }

    #[test]
    fn new_snapshot_clamps_the_cursor()
    {
        let mut app = app_with(vec![record("1", "A"), record("2", "B"), record("3", "C")]);
        app.cursor = 2;

        app.set_snapshot(Snapshot {
            exported_at: "2024-06-01T10:00:03Z".to_string(),
            update_count: 0,
            apps: vec![record("1", "A")],
        });

        assert_eq!(app.cursor, 0);
    }
}
