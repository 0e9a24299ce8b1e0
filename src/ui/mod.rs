use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, Borders, Cell, Clear, List, ListItem, Paragraph, Row, Table, TableState, Wrap,
};
use ratatui::Frame;
use regex::Regex;
use time::{macros::format_description, OffsetDateTime};

use crate::app::state::{AppState, OverlayState, Pane, RecordForm};
use crate::app::view::RecordView;
use crate::highlight::{build_highlight_regex, split_matches};
use crate::records::{Category, Record};
use crate::search::{Mode, TEXT_FILTERS};

const SIDEBAR_WIDTH: u16 = 30;

pub fn draw_app(frame: &mut Frame, state: &AppState, table_state: &mut TableState) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(2)])
        .split(frame.size());

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(40)])
        .split(vertical[0]);

    draw_sidebar(frame, state, columns[0]);
    match state.pane {
        Pane::Table => draw_table_pane(frame, state, table_state, columns[1]),
        Pane::Insert => draw_insert_pane(frame, state, columns[1]),
    }

    let status = build_status_line(state);
    let status_paragraph = Paragraph::new(status).style(Style::default().fg(Color::Gray));
    frame.render_widget(status_paragraph, vertical[1]);

    render_overlay(frame, state);
}

fn draw_sidebar(frame: &mut Frame, state: &AppState, area: Rect) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(4)])
        .split(area);

    let active = Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD);
    let mut items: Vec<ListItem> = Category::all()
        .into_iter()
        .enumerate()
        .map(|(idx, category)| {
            let style = if state.pane == Pane::Table && state.section == category {
                active
            } else {
                Style::default()
            };
            ListItem::new(Line::from(Span::styled(
                format!("{} {}", idx + 1, category.title()),
                style,
            )))
        })
        .collect();
    let insert_style = if state.pane == Pane::Insert {
        active
    } else {
        Style::default()
    };
    items.push(ListItem::new(Line::from(Span::styled(
        format!("n Add {} record", state.section.short_label()),
        insert_style,
    ))));
    let menu = List::new(items).block(Block::default().title("Front Desk").borders(Borders::ALL));
    frame.render_widget(menu, parts[0]);

    let operator = state.operator.as_deref().unwrap_or("not signed in");
    let account = Paragraph::new(vec![
        Line::from(Span::styled("Signed in as", Style::default().fg(Color::Gray))),
        Line::from(operator.to_string()),
    ])
    .block(Block::default().borders(Borders::ALL))
    .wrap(Wrap { trim: true });
    frame.render_widget(account, parts[1]);
}

fn draw_table_pane(frame: &mut Frame, state: &AppState, table_state: &mut TableState, area: Rect) {
    let view = &state.view;
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(TEXT_FILTERS as u16 + 3),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

    frame.render_widget(filter_bar(state), rows[0]);

    let title = table_title(view);
    let block = Block::default()
        .title(Span::styled(title, Style::default().add_modifier(Modifier::BOLD)))
        .borders(Borders::ALL);

    if view.records().is_empty() {
        let message = if view.is_loading() {
            "Loading records..."
        } else {
            "No records found"
        };
        let empty = Paragraph::new(Span::styled(message, Style::default().fg(Color::Gray)))
            .block(block);
        frame.render_widget(empty, rows[1]);
    } else {
        let regex = build_highlight_regex(&view.shown_filter().highlight_terms());
        let table = record_table(view, regex.as_ref()).block(block);
        frame.render_stateful_widget(table, rows[1], table_state);
    }

    let footer = match view.last_error() {
        Some(err) => Line::from(vec![
            Span::raw(view.footer()),
            Span::raw(" | "),
            Span::styled(err.to_string(), Style::default().fg(Color::Red)),
        ]),
        None => Line::from(Span::raw(view.footer())),
    };
    frame.render_widget(
        Paragraph::new(footer).style(Style::default().fg(Color::Gray)),
        rows[2],
    );
}

fn table_title(view: &RecordView) -> String {
    let suffix = if view.is_searching() {
        " (Searching...)"
    } else if view.shown_mode() == Mode::Searching {
        " (Filtered)"
    } else if view.is_loading() {
        " (Loading...)"
    } else {
        ""
    };
    format!("{}{suffix}", view.category().title())
}

fn filter_bar(state: &AppState) -> Paragraph<'static> {
    let filters = state.view.filters().raw();
    let specs = state.section.search_fields();
    let mut lines = Vec::with_capacity(TEXT_FILTERS + 1);
    for (slot, spec) in specs.iter().enumerate() {
        let editing = state.filter_input == Some(slot);
        let mut value = filters.terms[slot].clone();
        if editing {
            value.push('▌');
        }
        let label_style = if editing {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        lines.push(Line::from(vec![
            Span::styled(format!("{:<18}", format!("Search {}:", spec.label)), label_style),
            Span::raw(value),
        ]));
    }
    let chips = filters.date_chips();
    let chip_line = if chips.is_empty() {
        Line::from(Span::styled(
            "Dates: all (y year, m month, t date)",
            Style::default().fg(Color::Gray),
        ))
    } else {
        let mut spans = vec![Span::styled("Dates: ", Style::default().fg(Color::Gray))];
        for (idx, chip) in chips.into_iter().enumerate() {
            if idx > 0 {
                spans.push(Span::raw(" "));
            }
            spans.push(Span::styled(
                format!("[{chip}]"),
                Style::default().fg(Color::Yellow),
            ));
        }
        Line::from(spans)
    };
    lines.push(chip_line);

    let border = if state.is_filter_input_active() {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Paragraph::new(lines).block(
        Block::default()
            .title("Filters")
            .borders(Borders::ALL)
            .border_style(border),
    )
}

fn record_table(view: &RecordView, regex: Option<&Regex>) -> Table<'static> {
    let specs = view.category().fields();
    let header_style = Style::default().add_modifier(Modifier::BOLD);
    let mut header = vec![Cell::from(checkbox(view.header_checked()))];
    header.extend(specs.iter().map(|spec| Cell::from(spec.label)));
    header.push(Cell::from("Created"));

    let highlight_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    let rows: Vec<Row> = view
        .records()
        .iter()
        .map(|record| record_row(record, view.is_selected(&record.id), regex, highlight_style))
        .collect();

    let mut widths = vec![Constraint::Length(4)];
    widths.extend(specs.iter().map(|_| Constraint::Fill(1)));
    widths.push(Constraint::Length(17));

    Table::new(rows, widths)
        .header(Row::new(header).style(header_style))
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("> ")
}

fn record_row(
    record: &Record,
    selected: bool,
    regex: Option<&Regex>,
    highlight_style: Style,
) -> Row<'static> {
    let mut cells = vec![Cell::from(checkbox(selected))];
    for value in record.fields.values() {
        cells.push(Cell::from(Line::from(highlight_line(
            value,
            regex,
            highlight_style,
            Style::default(),
        ))));
    }
    cells.push(Cell::from(format_created(record.created_at)));
    Row::new(cells)
}

fn checkbox(checked: bool) -> &'static str {
    if checked {
        "[x]"
    } else {
        "[ ]"
    }
}

fn format_created(dt: OffsetDateTime) -> String {
    dt.format(&format_description!("[year]-[month]-[day] [hour]:[minute]"))
        .unwrap_or_else(|_| dt.unix_timestamp().to_string())
}

fn highlight_line(
    text: &str,
    regex: Option<&Regex>,
    highlight_style: Style,
    base_style: Style,
) -> Vec<Span<'static>> {
    split_matches(text, regex)
        .into_iter()
        .map(|(segment, matched)| {
            let style = if matched { highlight_style } else { base_style };
            Span::styled(segment.to_string(), style)
        })
        .collect()
}

fn draw_insert_pane(frame: &mut Frame, state: &AppState, area: Rect) {
    let mut lines = vec![
        Line::from(Span::styled(
            format!("Add {} record", state.section.short_label()),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    lines.extend(form_lines(&state.insert_form));
    lines.push(Line::from(""));
    if let Some(err) = &state.insert_error {
        lines.push(Line::from(Span::styled(
            err.clone(),
            Style::default().fg(Color::Red),
        )));
    }
    lines.push(Line::from(Span::styled(
        "Enter to save • Tab next field • Esc back to records",
        Style::default().fg(Color::Gray),
    )));
    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title(state.section.title())
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn form_lines(form: &RecordForm) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (idx, spec) in form.specs().iter().enumerate() {
        let focused = idx == form.focused();
        let mut value = form.value(idx).to_string();
        if focused {
            value.push('▌');
        }
        let label_style = if focused {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        lines.push(Line::from(vec![
            Span::styled(format!("{:<20}", format!("{}:", spec.label)), label_style),
            Span::raw(value),
        ]));
        if let Some(message) = form.errors().for_field(spec.column) {
            lines.push(Line::from(Span::styled(
                format!("  {message}"),
                Style::default().fg(Color::Red),
            )));
        }
    }
    lines
}

fn build_status_line(state: &AppState) -> Text<'static> {
    let view = &state.view;
    let selected = view.selected_visible().len();
    let mut first = vec![
        Span::raw(format!("Rows: {}", view.records().len())),
        Span::raw(" | Selected: "),
        Span::styled(
            selected.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ];
    if let Some(slot) = state.filter_input {
        first.push(Span::raw(" | Typing in: "));
        first.push(Span::styled(
            state.section.search_fields()[slot].label,
            Style::default().add_modifier(Modifier::BOLD),
        ));
    }
    if let Some(message) = &state.status_message {
        first.push(Span::raw(" | "));
        first.push(Span::styled(
            message.clone(),
            Style::default().fg(Color::Yellow),
        ));
    }

    let keys = match (state.pane, state.is_filter_input_active()) {
        (Pane::Insert, _) => "Enter save • Tab/Shift-Tab fields • Esc records • Ctrl-c quit",
        (Pane::Table, true) => "Type to filter • Tab next field • Enter/Esc done",
        (Pane::Table, false) => {
            "q quit • / filter • y year • m month • t date • x clear date • c clear • space select • a all • e edit • d/D delete • n add • 1/2 section • L logout"
        }
    };
    Text::from(vec![Line::from(first), Line::from(keys)])
}

fn render_overlay(frame: &mut Frame, state: &AppState) {
    match state.overlay() {
        Some(OverlayState::EditRecord(edit)) => {
            let area = centered_rect(60, 60, frame.size());
            frame.render_widget(Clear, area);
            let mut lines = vec![
                Line::from(Span::styled(
                    "Edit Record",
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
            ];
            lines.extend(form_lines(&edit.form));
            lines.push(Line::from(""));
            if let Some(err) = &edit.error {
                lines.push(Line::from(Span::styled(
                    err.clone(),
                    Style::default().fg(Color::Red),
                )));
            }
            lines.push(Line::from(Span::styled(
                "Enter to save • Esc to cancel",
                Style::default().fg(Color::Gray),
            )));
            let paragraph = Paragraph::new(lines)
                .block(
                    Block::default()
                        .title(edit.form.category().title())
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(Color::Cyan)),
                )
                .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
        }
        Some(OverlayState::ConfirmDelete(draft)) => {
            let area = centered_rect(50, 30, frame.size());
            frame.render_widget(Clear, area);
            let mut lines = vec![
                Line::from(Span::styled(
                    draft.prompt(),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
            ];
            if let Some(err) = &draft.error {
                lines.push(Line::from(Span::styled(
                    err.clone(),
                    Style::default().fg(Color::Red),
                )));
                lines.push(Line::from(""));
            }
            lines.push(Line::from(Span::styled(
                "Enter/y to delete • Esc/n to cancel",
                Style::default().fg(Color::Gray),
            )));
            let paragraph = Paragraph::new(lines)
                .block(
                    Block::default()
                        .title("Delete Records")
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(Color::Red)),
                )
                .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
        }
        Some(OverlayState::DatePrompt(prompt)) => {
            let area = centered_rect(50, 30, frame.size());
            frame.render_widget(Clear, area);
            let mut input = prompt.input.clone();
            input.push('▌');
            let mut lines = vec![
                Line::from(Span::styled(
                    "Filter by date (YYYY-MM-DD)",
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(input),
                Line::from(""),
            ];
            if let Some(err) = &prompt.error {
                lines.push(Line::from(Span::styled(
                    err.clone(),
                    Style::default().fg(Color::Red),
                )));
            }
            lines.push(Line::from(Span::styled(
                "Enter to apply (empty clears) • Esc to cancel",
                Style::default().fg(Color::Gray),
            )));
            let paragraph = Paragraph::new(lines)
                .block(
                    Block::default()
                        .title("Date")
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(Color::Cyan)),
                )
                .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
        }
        None => {}
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(vertical[1])[1]
}
