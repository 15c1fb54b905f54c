use chrono::Utc;
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
};

use crate::app::{App, AppState, MatchedField, View};
use crate::snapshot::{AppRecord, SOURCE_APP_STORE, SOURCE_BREW, SOURCE_SPARKLE};

/// Main render function
pub fn render(frame: &mut Frame,
              app: &mut App)
{
    let chunks = Layout::vertical([
        Constraint::Length(1),      // View tabs
        Constraint::Min(5),         // List
        Constraint::Length(1),      // Status bar
    ])
    .split(frame.area());

    render_tabs(frame, app, chunks[0]);

    match app.view
    {
        View::Search => render_search(frame, app, chunks[1]),
        View::Updates => render_updates(frame, app, chunks[1]),
        View::Tags => render_tags(frame, app, chunks[1]),
        View::Bulk => render_bulk(frame, app, chunks[1]),
    }

    render_status_bar(frame, app, chunks[2]);

    if app.state == AppState::ActionMenu
    {
        render_action_menu(frame, app);
    }

    if app.state == AppState::ConfirmBulkUpdate
    {
        render_confirm_dialog(frame, app);
    }

    if matches!(app.state, AppState::Updating(_))
    {
        render_updating_overlay(frame, app);
    }

    if app.state == AppState::Help
    {
        render_help_overlay(frame);
    }
}

/// Render the view switcher line
fn render_tabs(frame: &mut Frame,
               app: &App,
               area: Rect)
{
    let mut spans: Vec<Span> = Vec::new();

    for (i, view) in View::ALL.iter().enumerate()
    {
        let label = format!(" {}:{} ", i + 1, view.title());
        let style = if *view == app.view
        {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        }
        else
        {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(label, style));
    }

    if let Some(snapshot) = &app.snapshot
    {
        let summary = format!("  {} apps · {} updates", snapshot.apps.len(), snapshot.update_count);
        spans.push(Span::styled(summary, Style::default().fg(Color::DarkGray)));
    }

    let paragraph = Paragraph::new(Line::from(spans));
    frame.render_widget(paragraph, area);
}

/// Render the Search view (all apps, incremental filter)
fn render_search(frame: &mut Frame,
                 app: &mut App,
                 area: Rect)
{
    let is_searching = app.state == AppState::Search;
    let has_filter = !app.search_query.is_empty();

    // Split off a search bar line when the filter is in play
    let (search_area, list_area) = if is_searching || has_filter
    {
        let chunks = Layout::vertical([
            Constraint::Length(1), // Search bar
            Constraint::Min(3),    // App list
        ])
        .split(area);
        (Some(chunks[0]), chunks[1])
    }
    else
    {
        (None, area)
    };

    if let Some(search_area) = search_area
    {
        render_search_bar(frame, app, search_area, is_searching);
    }

    let visible_height = list_area.height.saturating_sub(2) as usize;
    app.visible_height = visible_height;
    app.adjust_scroll(visible_height);

    let rows = app.search_rows();
    let total = app.snapshot.as_ref().map(|s| s.apps.len()).unwrap_or(0);

    let title = if has_filter
    {
        format!(" Apps [{}/{} matches] ", rows.len(), total)
    }
    else
    {
        format!(" Apps ({}) ", total)
    };

    let block = Block::default().title(title)
                                .borders(Borders::ALL)
                                .border_style(Style::default().fg(Color::Cyan));

    let apps = match &app.snapshot
    {
        Some(snapshot) => &snapshot.apps,
        None =>
        {
            let paragraph =
                Paragraph::new("Vesslo data not found. Run the Vesslo app to export it.")
                    .block(block);
            frame.render_widget(paragraph, list_area);
            return;
        }
    };

    if rows.is_empty()
    {
        let paragraph = Paragraph::new("  No apps found")
            .block(block)
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(paragraph, list_area);
        return;
    }

    let items: Vec<ListItem> =
        rows.iter()
            .enumerate()
            .skip(app.scroll)
            .take(visible_height)
            .map(|(i, row)| {
                let record = &apps[row.app];
                let line = format!("{} {:<28} {:<36} {}",
                                   cursor_prefix(i == app.cursor),
                                   record.name,
                                   record.subtitle(),
                                   row_accessories(record, &row.matched));
                ListItem::new(line).style(row_style(record, i == app.cursor))
            })
            .collect();

    let list = List::new(items).block(block);
    frame.render_widget(list, list_area);
}

/// Render the search input line
fn render_search_bar(frame: &mut Frame,
                     app: &App,
                     area: Rect,
                     is_active: bool)
{
    let style = if is_active
    {
        Style::default().fg(Color::Yellow)
    }
    else
    {
        Style::default().fg(Color::DarkGray)
    };

    let search_text = format!("/{}", app.search_query);
    let paragraph = Paragraph::new(search_text).style(style);
    frame.render_widget(paragraph, area);

    if is_active
    {
        frame.set_cursor_position((area.x + 1 + app.search_cursor as u16, area.y));
    }
}

/// Render the Updates view (pending updates, sortable)
fn render_updates(frame: &mut Frame,
                  app: &mut App,
                  area: Rect)
{
    let visible_height = area.height.saturating_sub(2) as usize;
    app.visible_height = visible_height;
    app.adjust_scroll(visible_height);

    let rows = app.update_rows();
    let title = format!(" Updates ({}) - {} ", rows.len(), app.sort_order.label());

    let block = Block::default().title(title)
                                .borders(Borders::ALL)
                                .border_style(Style::default().fg(Color::Cyan));

    let apps = match &app.snapshot
    {
        Some(snapshot) => &snapshot.apps,
        None =>
        {
            let paragraph =
                Paragraph::new("Vesslo data not found. Run the Vesslo app to export it.")
                    .block(block);
            frame.render_widget(paragraph, area);
            return;
        }
    };

    if rows.is_empty()
    {
        let paragraph = Paragraph::new("  All apps are up to date!")
            .block(block)
            .style(Style::default().fg(Color::Green));
        frame.render_widget(paragraph, area);
        return;
    }
    let items: Vec<ListItem> =
        rows.iter()
            .enumerate()
            .skip(app.scroll)
            .take(visible_height)
            .map(|(i, &index)| {
                let record = &apps[index];
                let line = format!("{} {:<28} {:<24} [{}]  {}",
                                   cursor_prefix(i == app.cursor),
                                   record.name,
                                   record.version_arrow(),
                                   record.primary_source(),
                                   record.developer.as_deref().unwrap_or(""));
                let style = if i == app.cursor
                {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                }
                else
                {
                    Style::default().fg(source_color(record.primary_source()))
                };
                ListItem::new(line).style(style)
            })
            .collect();

    let list = List::new(items).block(block);
    frame.render_widget(list, area);
}

/// Render the Tags view (tag list, or the apps behind one tag)
fn render_tags(frame: &mut Frame,
               app: &mut App,
               area: Rect)
{
    let visible_height = area.height.saturating_sub(2) as usize;
    app.visible_height = visible_height;
    app.adjust_scroll(visible_height);

    match app.selected_tag.clone()
    {
        Some(tag) => render_tag_apps(frame, app, area, &tag, visible_height),
        None => render_tag_list(frame, app, area, visible_height),
    }
}

fn render_tag_list(frame: &mut Frame,
                   app: &App,
                   area: Rect,
                   visible_height: usize)
{
    let groups = app.tag_groups();
    let title = format!(" Tags ({}) ", groups.len());

    let block = Block::default().title(title)
                                .borders(Borders::ALL)
                                .border_style(Style::default().fg(Color::Cyan));

    if groups.is_empty()
    {
        let paragraph = Paragraph::new("  No tags found. Add tags to your apps in Vesslo.")
            .block(block)
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> =
        groups.iter()
              .enumerate()
              .skip(app.scroll)
              .take(visible_height)
              .map(|(i, group)| {
                  let line = format!("{} #{:<30} {} apps",
                                     cursor_prefix(i == app.cursor),
                                     group.name,
                                     group.apps.len());
                  let style = if i == app.cursor
                  {
                      Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                  }
                  else
                  {
                      Style::default().fg(Color::Magenta)
                  };
                  ListItem::new(line).style(style)
              })
              .collect();

    let list = List::new(items).block(block);
    frame.render_widget(list, area);
}

fn render_tag_apps(frame: &mut Frame,
                   app: &App,
                   area: Rect,
                   tag: &str,
                   visible_height: usize)
{
    let rows = app.apps_with_tag(tag);
    let title = format!(" #{} ({} apps) ", tag, rows.len());

    let block = Block::default().title(title)
                                .borders(Borders::ALL)
                                .border_style(Style::default().fg(Color::Cyan));

    let apps = match &app.snapshot
    {
        Some(snapshot) => &snapshot.apps,
        None =>
        {
            frame.render_widget(Paragraph::new("").block(block), area);
            return;
        }
    };

    let items: Vec<ListItem> =
        rows.iter()
            .enumerate()
            .skip(app.scroll)
            .take(visible_height)
            .map(|(i, &index)| {
                let record = &apps[index];
                let line = format!("{} {:<28} {:<36} {}",
                                   cursor_prefix(i == app.cursor),
                                   record.name,
                                   record.subtitle(),
                                   row_accessories(record, &[]));
                ListItem::new(line).style(row_style(record, i == app.cursor))
            })
            .collect();

    let list = List::new(items).block(block);
    frame.render_widget(list, area);
}

/// Render the Bulk Homebrew view
fn render_bulk(frame: &mut Frame,
               app: &mut App,
               area: Rect)
{
    let visible_height = area.height.saturating_sub(2) as usize;
    app.visible_height = visible_height;
    app.adjust_scroll(visible_height);

    let rows = app.bulk_rows();
    let title = format!(" Homebrew Updates ({}) ", rows.len());

    let block = Block::default().title(title)
                                .borders(Borders::ALL)
                                .border_style(Style::default().fg(Color::Cyan));

    let apps = match &app.snapshot
    {
        Some(snapshot) => &snapshot.apps,
        None =>
        {
            let paragraph =
                Paragraph::new("Vesslo data not found. Run the Vesslo app to export it.")
                    .block(block);
            frame.render_widget(paragraph, area);
            return;
        }
    };

    if rows.is_empty()
    {
        let paragraph = Paragraph::new("  All Homebrew apps are up to date!")
            .block(block)
            .style(Style::default().fg(Color::Green));
        frame.render_widget(paragraph, area);
        return;
    }
    let mut items: Vec<ListItem> = Vec::new();

    // Row 0 is the synthetic "Update All" entry
    let update_all = format!("{} {:<28} {} apps  [BULK]",
                             cursor_prefix(app.cursor == 0),
                             "Update All Homebrew Apps",
                             rows.len());
    let update_all_style = if app.cursor == 0
    {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    }
    else
    {
        Style::default().fg(Color::Green)
    };
    items.push(ListItem::new(update_all).style(update_all_style));

    items.extend(rows.iter().enumerate().map(|(i, &index)| {
                     let record = &apps[index];
                     let row_index = i + 1;
                     let line = format!("{} {:<28} {:<24} {}",
                                        cursor_prefix(row_index == app.cursor),
                                        record.name,
                                        record.version_arrow(),
                                        record.developer.as_deref().unwrap_or(""));
                     let style = if row_index == app.cursor
                     {
                         Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                     }
                     else
                     {
                         Style::default().fg(source_color(SOURCE_BREW))
                     };
                     ListItem::new(line).style(style)
                 }));

    let skip = app.scroll.min(items.len());
    let items: Vec<ListItem> = items.into_iter().skip(skip).take(visible_height).collect();

    let list = List::new(items).block(block);
    frame.render_widget(list, area);
}

/// Render the status bar
fn render_status_bar(frame: &mut Frame,
                     app: &App,
                     area: Rect)
{
    let spinner = app.spinner_char();
    let stale = app.snapshot
                   .as_ref()
                   .is_some_and(|snapshot| !snapshot.is_fresh(Utc::now()));

    let status_text = if let Some(ref msg) = app.status_message
    {
        msg.clone()
    }
    else
    {
        match &app.state
        {
            AppState::Updating(what) => format!("{} {}...", spinner, what),
            AppState::Search => "[Enter]confirm  [Esc]clear  [↑↓]navigate".to_string(),
            AppState::ActionMenu => "[↑↓/jk]select  [Enter]run  [Esc]close".to_string(),
            AppState::ConfirmBulkUpdate =>
            {
                "[←→/Tab]switch  [Enter]confirm  [Esc]cancel".to_string()
            }
            AppState::Error(e) => format!("Error: {}", e),
            AppState::Help => "Press q or ? to close help".to_string(),
            AppState::Ready =>
            {
                let hints = "[1-4]view  [↑↓/jk]move  [Enter]actions  [/]search  [s]sort  [r]refresh  [?]help  [q]uit";
                if stale
                {
                    format!("Vesslo data is older than 24h  ·  {}", hints)
                }
                else
                {
                    hints.to_string()
                }
            }
        }
    };

    let style = match &app.state
    {
        AppState::Error(_) => Style::default().fg(Color::Red),
        AppState::Updating(_) => Style::default().fg(Color::Yellow),
        _ if stale => Style::default().fg(Color::Yellow),
        _ => Style::default().fg(Color::DarkGray),
    };

    let paragraph = Paragraph::new(status_text).style(style);
    frame.render_widget(paragraph, area);
}

/// Render the action menu overlay
fn render_action_menu(frame: &mut Frame,
                      app: &App)
{
    let menu = match &app.action_menu
    {
        Some(menu) => menu,
        None => return,
    };

    let area = centered_rect(44, 50, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default().title(format!(" {} ", menu.title))
                                .borders(Borders::ALL)
                                .border_style(Style::default().fg(Color::Cyan));

    let items: Vec<ListItem> = menu.entries
                                   .iter()
                                   .enumerate()
                                   .map(|(i, entry)| {
                                       let is_selected = i == menu.selected;
                                       let line = format!("{} {}",
                                                          cursor_prefix(is_selected),
                                                          entry.label);
                                       let style = if is_selected
                                       {
                                           Style::default().fg(Color::Yellow)
                                                           .add_modifier(Modifier::BOLD)
                                       }
                                       else
                                       {
                                           Style::default().fg(Color::White)
                                       };
                                       ListItem::new(line).style(style)
                                   })
                                   .collect();

    let list = List::new(items).block(block);
    frame.render_widget(list, area);
}

/// Render the bulk update confirmation dialog
fn render_confirm_dialog(frame: &mut Frame,
                         app: &App)
{
    let area = centered_rect(50, 24, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default().title(" Update All Homebrew Apps ")
                                .borders(Borders::ALL)
                                .border_style(Style::default().fg(Color::Cyan));

    let yes_style = if app.confirm_yes
    {
        Style::default().fg(Color::Black).bg(Color::Yellow).add_modifier(Modifier::BOLD)
    }
    else
    {
        Style::default().fg(Color::White)
    };

    let no_style = if app.confirm_yes
    {
        Style::default().fg(Color::White)
    }
    else
    {
        Style::default().fg(Color::Black).bg(Color::Yellow).add_modifier(Modifier::BOLD)
    };

    let text = vec![
        Line::from(""),
        Line::from(format!("This will update {} apps using Homebrew. Continue?", app.bulk_count)),
        Line::from(""),
        Line::from(vec![
            Span::raw("      "),
            Span::styled(" [ Update All ] ", yes_style),
            Span::raw("      "),
            Span::styled(" [ Cancel ] ", no_style),
            Span::raw("      "),
        ]),
    ];

    let paragraph = Paragraph::new(text).block(block)
                                        .alignment(ratatui::layout::Alignment::Center);
    frame.render_widget(paragraph, area);
}

/// Render the in-flight task overlay
fn render_updating_overlay(frame: &mut Frame,
                           app: &App)
{
    let what = match &app.state
    {
        AppState::Updating(what) => what.clone(),
        _ => return,
    };

    let area = centered_rect(40, 20, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default().borders(Borders::ALL)
                                .border_style(Style::default().fg(Color::Yellow));

    let message = format!("{}  {}...", app.spinner_char(), what);
    let text = vec![
        Line::from(""),
        Line::from(Span::styled(message,
                                Style::default().fg(Color::Yellow)
                                                .add_modifier(Modifier::BOLD))),
        Line::from(""),
    ];

    let paragraph = Paragraph::new(text).block(block)
                                        .alignment(ratatui::layout::Alignment::Center);
    frame.render_widget(paragraph, area);
}

/// Render help overlay
fn render_help_overlay(frame: &mut Frame)
{
    let area = centered_rect(60, 70, frame.area());
    frame.render_widget(Clear, area);

    let help_text = vec![
        Line::from(vec![
            Span::styled("Keyboard Controls", Style::default().add_modifier(Modifier::BOLD)),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  1-4 / Tab ", Style::default().fg(Color::Cyan)),
            Span::raw("Switch view (Search, Updates, Tags, Bulk)"),
        ]),
        Line::from(vec![
            Span::styled("  ↑ / k     ", Style::default().fg(Color::Cyan)),
            Span::raw("Move cursor up"),
        ]),
        Line::from(vec![
            Span::styled("  ↓ / j     ", Style::default().fg(Color::Cyan)),
            Span::raw("Move cursor down"),
        ]),
        Line::from(vec![
            Span::styled("  Ctrl-F/B  ", Style::default().fg(Color::Cyan)),
            Span::raw("Page down / page up"),
        ]),
        Line::from(vec![
            Span::styled("  Ctrl-D/U  ", Style::default().fg(Color::Cyan)),
            Span::raw("Half page down / half page up"),
        ]),
        Line::from(vec![
            Span::styled("  g / G     ", Style::default().fg(Color::Cyan)),
            Span::raw("Go to first / last item"),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Enter     ", Style::default().fg(Color::Cyan)),
            Span::raw("Open actions for the selection / open tag"),
        ]),
        Line::from(vec![
            Span::styled("  Bksp/h    ", Style::default().fg(Color::Cyan)),
            Span::raw("Back out of a tag or clear the filter"),
        ]),
        Line::from(vec![
            Span::styled("  /         ", Style::default().fg(Color::Cyan)),
            Span::raw("Search apps by name, developer, tag or memo"),
        ]),
        Line::from(vec![
            Span::styled("  s         ", Style::default().fg(Color::Cyan)),
            Span::raw("Cycle sort order (Updates view)"),
        ]),
        Line::from(vec![
            Span::styled("  r         ", Style::default().fg(Color::Cyan)),
            Span::raw("Reload the Vesslo snapshot now"),
        ]),
        Line::from(vec![
            Span::styled("  ?         ", Style::default().fg(Color::Cyan)),
            Span::raw("Toggle this help"),
        ]),
        Line::from(vec![
            Span::styled("  q / Esc   ", Style::default().fg(Color::Cyan)),
            Span::raw("Quit"),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("Updates:", Style::default().fg(Color::Yellow)),
        ]),
        Line::from("  Actions either hand off to Vesslo (vesslo:// links)"),
        Line::from("  or run brew/mas directly, captured or in Terminal."),
        Line::from(""),
        Line::from(vec![
            Span::styled("Data:", Style::default().fg(Color::Yellow)),
        ]),
        Line::from("  The snapshot file is re-checked every 3 seconds; the"),
        Line::from("  view refreshes when Vesslo writes a new export."),
    ];

    let block = Block::default().title(" Help ")
                                .borders(Borders::ALL)
                                .border_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(help_text).block(block);
    frame.render_widget(paragraph, area);
}

fn cursor_prefix(is_selected: bool) -> &'static str
{
    if is_selected { ">" } else { " " }
}

/// Row accessories: match markers, update badge, source badges
fn row_accessories(record: &AppRecord,
                   matched: &[MatchedField])
                   -> String
{
    let mut parts: Vec<String> = Vec::new();

    for field in matched
    {
        parts.push(format!("~{}", field.label()));
    }

    if record.has_pending_update()
    {
        parts.push("[UPDATE]".to_string());
    }

    for source in &record.sources
    {
        parts.push(format!("[{}]", source));
    }

    parts.join(" ")
}

fn row_style(record: &AppRecord,
             is_selected: bool)
             -> Style
{
    if is_selected
    {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    }
    else if record.has_pending_update()
    {
        Style::default().fg(Color::Green)
    }
    else
    {
        Style::default().fg(Color::Gray)
    }
}

/// Badge colors per install source
fn source_color(source: &str) -> Color
{
    match source
    {
        SOURCE_BREW => Color::Yellow,
        SOURCE_APP_STORE => Color::Blue,
        SOURCE_SPARKLE => Color::Green,
        _ => Color::DarkGray,
    }
}

/// Create a centered rect with percentage of parent
fn centered_rect(percent_x: u16,
                 percent_y: u16,
                 area: Rect)
                 -> Rect
{
    let popup_layout = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .split(area);

    Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .split(popup_layout[1])[1]
}
