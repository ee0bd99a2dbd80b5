use chrono::Utc;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell as TableCell, Clear, Paragraph, Row, Table, TableState, Wrap},
};

use crate::domain::CMDMode;
use crate::model::{Model, Modus};
use crate::patient::{AVATAR_PALETTE_SIZE, Patient, PatientField};
use crate::source::SourceState;
use crate::view::{Cell, PageItem, ViewController};

pub const HEADER_HEIGHT: u16 = 1;
pub const SEARCH_HEIGHT: u16 = 3;
pub const FOOTER_HEIGHT: u16 = 1;
pub const CMDLINE_HEIGHT: u16 = 1;
const ROW_HEIGHT: u16 = 2;

const ACCENT: Color = Color::Cyan;
const MUTED: Color = Color::DarkGray;
const ERROR: Color = Color::Red;
const SUCCESS: Color = Color::Green;

/// Background colors of the avatar palette.
const AVATAR_COLORS: [Color; AVATAR_PALETTE_SIZE] = [
    Color::Red,
    Color::Blue,
    Color::Green,
    Color::Yellow,
    Color::Magenta,
    Color::Cyan,
    Color::LightRed,
];

const COLUMN_WIDTHS: [Constraint; 6] = [
    Constraint::Min(24),
    Constraint::Length(10),
    Constraint::Length(14),
    Constraint::Min(20),
    Constraint::Length(16),
    Constraint::Length(16),
];

#[derive(Debug, Default)]
pub struct RegistryUI {}

impl RegistryUI {
    pub fn new() -> Self {
        Self {}
    }

    pub fn draw(&self, model: &Model, frame: &mut Frame) {
        let [header, search, table, footer, cmdline] = Layout::vertical([
            Constraint::Length(HEADER_HEIGHT),
            Constraint::Length(SEARCH_HEIGHT),
            Constraint::Min(3),
            Constraint::Length(FOOTER_HEIGHT),
            Constraint::Length(CMDLINE_HEIGHT),
        ])
        .areas(frame.area());

        self.render_header(model, frame, header);
        self.render_search(model, frame, search);
        self.render_table(model, frame, table);
        self.render_footer(model.view(), frame, footer);
        self.render_cmdline(model, frame, cmdline);

        match model.modus() {
            Modus::REGISTER => self.render_register_form(model, frame),
            Modus::CONFIRM_DELETE(_) => self.render_delete_modal(model, frame),
            Modus::POPUP => self.render_popup(model.popup_message(), frame),
            Modus::DIRECTORY | Modus::CMDINPUT => {}
        }
    }

    fn render_header(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let count = match model.source_state() {
            SourceState::Ready(rows) => format!("{} patients", rows.len()),
            SourceState::Loading => "loading…".to_string(),
            SourceState::Unavailable(_) => "offline".to_string(),
        };
        let line = Line::from(vec![
            Span::styled(" Patient Directory ", Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
            Span::styled(count, Style::default().fg(MUTED)),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }

    fn render_search(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let searching = matches!(model.cmd_input(), Some((CMDMode::Search, _)));
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Search ")
            .border_style(Style::default().fg(if searching { ACCENT } else { MUTED }));

        let text = model.search_text();
        let content = if searching {
            Line::from(vec![Span::raw(text.to_string()), Span::raw("▎").fg(ACCENT)])
        } else if text.is_empty() {
            Line::from(Span::styled(
                "Search patients by name, email, phone or address (/)",
                Style::default().fg(MUTED),
            ))
        } else {
            Line::from(text.to_string())
        };
        frame.render_widget(Paragraph::new(content).block(block), area);
    }

    fn render_table(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let view = model.view();
        let header = Row::new(model.columns().iter().map(|column| {
            let sorted = column.sort_field.is_some()
                && view.params().sort_key.as_deref() == column.sort_field;
            let label = if sorted {
                format!("{} {}", column.header, view.params().sort_direction.arrow())
            } else {
                column.header.to_string()
            };
            TableCell::from(label)
        }))
        .style(Style::default().add_modifier(Modifier::BOLD))
        .bottom_margin(1);
        let block = Block::default().borders(Borders::TOP | Borders::BOTTOM);

        match model.source_state() {
            SourceState::Loading => {
                let rows = (0..view.params().page_size.get()).map(|_| skeleton_row(model.columns().len()));
                let table = Table::new(rows, COLUMN_WIDTHS).header(header).block(block);
                frame.render_widget(table, area);
            }
            SourceState::Unavailable(reason) => {
                let message = Text::from(vec![
                    Line::from("Patient directory is unavailable.".fg(ERROR)),
                    Line::from(reason.as_str().fg(MUTED)),
                ]);
                let paragraph = Paragraph::new(message)
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true })
                    .block(block);
                frame.render_widget(paragraph, area);
            }
            SourceState::Ready(_) if view.total_rows() == 0 => {
                let [table_area, message_area] =
                    Layout::vertical([Constraint::Length(3), Constraint::Min(1)]).areas(area);
                frame.render_widget(Table::new(Vec::<Row>::new(), COLUMN_WIDTHS).header(header), table_area);
                let paragraph = Paragraph::new("No results.")
                    .alignment(Alignment::Center)
                    .fg(MUTED);
                frame.render_widget(paragraph, message_area);
            }
            SourceState::Ready(_) => {
                let now = Utc::now();
                let rows = view.visible_rows().into_iter().map(|patient| {
                    let cells = model
                        .columns()
                        .iter()
                        .map(|column| render_cell(column.render(patient, now)));
                    Row::new(cells).height(ROW_HEIGHT)
                });
                let table = Table::new(rows, COLUMN_WIDTHS)
                    .header(header)
                    .block(block)
                    .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
                    .highlight_symbol("▸ ");
                let mut state = TableState::default().with_selected(Some(model.selected_row()));
                frame.render_stateful_widget(table, area, &mut state);
            }
        }
    }

    fn render_footer(&self, view: &ViewController<Patient>, frame: &mut Frame, area: Rect) {
        let snapshot = view.snapshot();
        let summary = footer_summary(snapshot.start_row, snapshot.end_row, snapshot.total_rows);

        let mut spans = vec![
            Span::styled(summary, Style::default().fg(MUTED)),
            Span::raw("   "),
            Span::raw(format!("{} / page", snapshot.page_size)),
            Span::raw("   "),
        ];
        spans.extend(pager_spans(
            &snapshot.plan,
            snapshot.page_index + 1,
            view.can_prev_page(),
            view.can_next_page(),
        ));
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn render_cmdline(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let line = match model.cmd_input() {
            Some((mode, input)) => {
                frame.set_cursor_position((
                    area.x + (mode.prompt().chars().count() + input.curser_pos) as u16,
                    area.y,
                ));
                Line::from(vec![Span::raw(mode.prompt()).fg(ACCENT), Span::raw(input.input.clone())])
            }
            None => match model.status_message() {
                Some(message) => Line::from(message.to_string()),
                None => Line::from(Span::styled(
                    "? help  / search  a register  d delete  q quit",
                    Style::default().fg(MUTED),
                )),
            },
        };
        frame.render_widget(Paragraph::new(line), area);
    }

    fn render_register_form(&self, model: &Model, frame: &mut Frame) {
        let modal_area = centered_rect(60, 70, frame.area());
        frame.render_widget(Clear, modal_area);

        let block = Block::default()
            .title(" Patient Registration ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(ACCENT));
        let inner = block.inner(modal_area);
        frame.render_widget(block, modal_area);

        let form = model.form();
        let mut lines: Vec<Line> = vec![Line::raw("")];
        for field in PatientField::ALL {
            let focused = form.focused() == field;
            let marker = if focused { "▸" } else { " " };
            let label = if field.required() {
                format!("{}*", field.label())
            } else {
                field.label().to_string()
            };
            let label_style = if focused {
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let value = form.value(field);
            let value_span = if value.is_empty() && !focused {
                Span::styled(field.placeholder(), Style::default().fg(MUTED))
            } else if focused {
                Span::raw(format!("{value}▎"))
            } else {
                Span::raw(value.to_string())
            };
            lines.push(Line::from(vec![
                Span::raw(format!("  {marker} ")),
                Span::styled(format!("{label:<15}"), label_style),
                value_span,
            ]));
            if let Some(message) = form.errors().for_field(field) {
                lines.push(Line::from(vec![
                    Span::raw(" ".repeat(20)),
                    Span::styled(format!("✗ {message}"), Style::default().fg(ERROR)),
                ]));
            }
        }

        lines.push(Line::raw(""));
        lines.push(Line::from(vec![
            Span::raw("  "),
            Span::styled("Tab", Style::default().fg(MUTED)),
            Span::raw(":field "),
            Span::styled("Enter", Style::default().fg(SUCCESS)),
            Span::raw(":register "),
            Span::styled("Esc", Style::default().fg(MUTED)),
            Span::raw(":back"),
        ]));
        if let Some(message) = model.status_message() {
            lines.push(Line::from(format!("  {message}")));
        }

        frame.render_widget(Paragraph::new(lines), inner);
    }

    fn render_delete_modal(&self, model: &Model, frame: &mut Frame) {
        let modal_area = centered_rect(40, 20, frame.area());
        frame.render_widget(Clear, modal_area);

        let block = Block::default()
            .title(" Delete patient ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(ERROR));
        let inner = block.inner(modal_area);
        frame.render_widget(block, modal_area);

        let name = model
            .delete_candidate()
            .map(|p| p.full_name())
            .unwrap_or_else(|| "?".to_string());
        let lines = vec![
            Line::raw(""),
            Line::from(vec![
                Span::raw("  Delete "),
                Span::styled(name, Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
                Span::raw("?"),
            ]),
            Line::raw(""),
            Line::from(vec![
                Span::raw("  "),
                Span::styled("y/Enter", Style::default().fg(SUCCESS)),
                Span::raw(" to confirm, "),
                Span::styled("n/Esc", Style::default().fg(ERROR)),
                Span::raw(" to cancel"),
            ]),
        ];
        frame.render_widget(Paragraph::new(lines), inner);
    }

    fn render_popup(&self, message: &str, frame: &mut Frame) {
        let area = centered_rect(60, 70, frame.area());
        frame.render_widget(Clear, area);
        let block = Block::bordered().title(" Help ".bold()).title_bottom(" Esc to close ");
        frame.render_widget(Paragraph::new(message).block(block), area);
    }
}

fn render_cell(cell: Cell) -> TableCell<'static> {
    match cell {
        Cell::Text { primary, secondary } => {
            let mut lines = vec![Line::from(primary)];
            if let Some(secondary) = secondary {
                lines.push(Line::from(Span::styled(secondary, Style::default().fg(MUTED))));
            }
            TableCell::from(Text::from(lines))
        }
        Cell::Badge(label) => TableCell::from(Line::from(
            Span::raw(format!(" {label} ")).bg(Color::Gray).fg(Color::Black),
        )),
        Cell::Avatar {
            initials,
            palette,
            title,
            subtitle,
        } => {
            let color = AVATAR_COLORS[palette % AVATAR_COLORS.len()];
            let mut lines = vec![Line::from(vec![
                Span::raw(format!(" {initials} ")).bg(color).fg(Color::White).bold(),
                Span::raw(" "),
                Span::raw(title).bold(),
            ])];
            if let Some(subtitle) = subtitle {
                lines.push(Line::from(vec![
                    Span::raw("     "),
                    Span::styled(subtitle, Style::default().fg(MUTED)),
                ]));
            }
            TableCell::from(Text::from(lines))
        }
        menu @ Cell::Menu(_) => TableCell::from(Line::from(format!("⋯ {}", menu.plain())).fg(MUTED)),
    }
}

fn skeleton_row(columns: usize) -> Row<'static> {
    Row::new((0..columns).map(|_| TableCell::from("░░░░░░░░".fg(MUTED)))).height(ROW_HEIGHT)
}

pub fn footer_summary(start_row: usize, end_row: usize, total_rows: usize) -> String {
    format!("Showing {start_row}–{end_row} of {total_rows} rows")
}

/// Pager as spans: previous, page buttons with gaps, next.
pub fn pager_spans(plan: &[PageItem], active_page: usize, can_prev: bool, can_next: bool) -> Vec<Span<'static>> {
    let enabled = |on: bool| if on { Style::default() } else { Style::default().fg(MUTED) };
    let mut spans = vec![Span::styled("‹", enabled(can_prev))];
    for item in plan {
        spans.push(Span::raw(" "));
        spans.push(match item {
            PageItem::Page(page) if *page == active_page => {
                Span::styled(format!("[{page}]"), Style::default().fg(ACCENT).add_modifier(Modifier::BOLD))
            }
            PageItem::Page(page) => Span::raw(page.to_string()),
            PageItem::Ellipsis => Span::styled("…", Style::default().fg(MUTED)),
        });
    }
    spans.push(Span::raw(" "));
    spans.push(Span::styled("›", enabled(can_next)));
    spans
}

/// Center a modal of given percentage within the area.
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let [_, middle, _] = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .areas(area);

    let [_, center, _] = Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .areas(middle);
    center
}
