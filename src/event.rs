use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Commands the event loop executes, mostly as background tasks
#[derive(Debug, Clone)]
pub enum Command
{
    /// Launch the app bundle
    OpenApp
    {
        path: String
    },
    /// Reveal the bundle in Finder
    RevealInFinder
    {
        path: String
    },
    /// Copy the bundle id to the clipboard
    CopyBundleId
    {
        bundle_id: String
    },
    /// Open the app's page inside Vesslo
    OpenInVesslo
    {
        bundle_id: String
    },
    /// Hand a single update to Vesslo via deep link
    UpdateInVesslo
    {
        bundle_id: String,
        name: String,
    },
    /// Hand the whole batch to Vesslo via deep link
    UpdateAllInVesslo,
    /// Captured `brew upgrade --cask <cask>`
    BrewUpgrade
    {
        cask: String,
        name: String,
    },
    /// Captured `brew upgrade --cask` over everything outdated
    BrewUpgradeAll
    {
        count: usize
    },
    /// Cask upgrade in an interactive Terminal window
    BrewUpgradeInTerminal
    {
        cask: String
    },
    /// Open the app's App Store page
    OpenAppStorePage
    {
        app_store_id: String
    },
    /// Captured `mas upgrade <id>`
    MasUpgrade
    {
        app_store_id: String,
        name: String,
    },
    /// mas upgrade in an interactive Terminal window
    MasUpgradeInTerminal
    {
        app_store_id: String
    },
    /// Re-ingest the snapshot file now instead of waiting for the poll
    Refresh,
    /// Quit the application
    Quit,
}

/// Movement amount for vi-style navigation
#[derive(Debug, Clone, Copy)]
pub enum Movement
{
    Up(i32),
    Down(i32),
    PageUp,      // Full page up (Ctrl-B)
    PageDown,    // Full page down (Ctrl-F)
    HalfPageUp,  // Half page up (Ctrl-U)
    HalfPageDown,// Half page down (Ctrl-D)
    Top,         // Go to top (Home, g)
    Bottom,      // Go to bottom (End, G)
}

/// Convert a key event to movement
pub fn key_to_movement(key: &KeyEvent) -> Option<Movement>
{
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match (key.code, ctrl)
    {
        // Vi-style Ctrl navigation
        (KeyCode::Char('f'), true) => Some(Movement::PageDown),
        (KeyCode::Char('b'), true) => Some(Movement::PageUp),
        (KeyCode::Char('d'), true) => Some(Movement::HalfPageDown),
        (KeyCode::Char('u'), true) => Some(Movement::HalfPageUp),

        // Standard navigation
        (KeyCode::Up, _) | (KeyCode::Char('k'), false) => Some(Movement::Up(1)),
        (KeyCode::Down, _) | (KeyCode::Char('j'), false) => Some(Movement::Down(1)),
        (KeyCode::PageUp, _) => Some(Movement::PageUp),
        (KeyCode::PageDown, _) => Some(Movement::PageDown),
        (KeyCode::Home, _) | (KeyCode::Char('g'), false) => Some(Movement::Top),
        (KeyCode::End, _) | (KeyCode::Char('G'), false) => Some(Movement::Bottom),

        _ => None,
    }
}

/// Check if key switches directly to a view (1-4)
pub fn view_index(key: KeyCode) -> Option<usize>
{
    match key
    {
        KeyCode::Char('1') => Some(0),
        KeyCode::Char('2') => Some(1),
        KeyCode::Char('3') => Some(2),
        KeyCode::Char('4') => Some(3),
        _ => None,
    }
}

/// Check if key cycles to the next view
pub fn is_view_cycle(key: KeyCode) -> bool
{
    matches!(key, KeyCode::Tab | KeyCode::BackTab)
}

/// Check if key is a selection/enter
pub fn is_select(key: KeyCode) -> bool
{
    matches!(key, KeyCode::Enter)
}

/// Check if key is go back
pub fn is_back(key: KeyCode) -> bool
{
    matches!(key, KeyCode::Backspace | KeyCode::Left | KeyCode::Char('h'))
}

/// Check if key starts incremental search
pub fn is_search(key: KeyCode) -> bool
{
    matches!(key, KeyCode::Char('/'))
}

/// Check if key cycles the sort order
pub fn is_sort_cycle(key: KeyCode) -> bool
{
    matches!(key, KeyCode::Char('s'))
}

/// Check if key forces a snapshot refresh
pub fn is_refresh(key: KeyCode) -> bool
{
    matches!(key, KeyCode::Char('r'))
}

/// Check if key is quit
pub fn is_quit(key: KeyCode) -> bool
{
    matches!(key, KeyCode::Char('q') | KeyCode::Esc)
}

/// Check if key is help
pub fn is_help(key: KeyCode) -> bool
{
    matches!(key, KeyCode::Char('?'))
}
