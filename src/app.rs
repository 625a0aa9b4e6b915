use crate::canvas::export;
use crate::canvas::{CanvasDocument, ListKey, Section, SectionList, MAX_ITEMS};
use crate::chat::transcript::Role;
use crate::chat::{lean_canvas_system_message, ChatSession};
use crate::completion::{CompletionDriver, ExchangeRequest};
use crate::config::LeanCanvasConfig;
use crate::edit::notification::resolve_title;
use crate::edit::{CanvasEditor, EditNotification, Slot};
use crate::event::AppEvent;
use crate::theme::Theme;
use eframe::egui::{self, Align, Layout, RichText, ScrollArea};
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const ROW_HEIGHT: f32 = 190.0;
const TOP_COLUMNS: [&[&str]; 5] = [
    &["problem"],
    &["solution", "key-metrics"],
    &["unique-value-proposition"],
    &["unfair-advantage", "channels"],
    &["customer-segments"],
];
const BOTTOM_ROW: [&str; 2] = ["cost-structure", "revenue-streams"];

// Collected while rendering, applied in order after the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CanvasAction {
    Focus(Slot),
    Update(Slot, String),
    Commit(Slot),
    Add(ListKey),
    Remove(Slot),
    FocusGranted,
}

pub struct LeanCanvasApp {
    rx: Receiver<AppEvent>,
    driver: CompletionDriver,
    chat: ChatSession,
    editor: CanvasEditor,
    theme: Theme,
    input_buffer: String,
    focus_request: Option<Slot>,
    export_path: PathBuf,
    service_label: String,
    diagnostics_log: Vec<String>,
    scroll_to_bottom: bool,
}

impl LeanCanvasApp {
    pub fn new(rx: Receiver<AppEvent>, driver: CompletionDriver, config: &LeanCanvasConfig) -> Self {
        let chat = ChatSession::new(lean_canvas_system_message(), driver.fragment_mode());
        Self {
            rx,
            driver,
            chat,
            editor: CanvasEditor::new(CanvasDocument::lean_canvas()),
            theme: Theme::default(),
            input_buffer: String::new(),
            focus_request: None,
            export_path: config.export_path(),
            service_label: format!("{} · {}", config.service_kind.as_str(), config.model_id),
            diagnostics_log: Vec::new(),
            scroll_to_bottom: false,
        }
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    fn timestamp() -> String {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(duration) => duration.as_secs().to_string(),
            Err(_) => "0".to_string(),
        }
    }

    fn log_diagnostic(&mut self, message: impl Into<String>) {
        self.diagnostics_log
            .push(format!("[{}] {}", Self::timestamp(), message.into()));
    }

    fn dispatch(&mut self, request: Option<ExchangeRequest>) {
        if let Some(request) = request {
            self.driver.dispatch(request);
        }
    }

    fn send_user_turn(&mut self, content: String) {
        let request = self.chat.submit_user_message(content);
        if request.is_none() {
            self.log_diagnostic("assistant busy, message queued");
        }
        self.dispatch(request);
        self.scroll_to_bottom = true;
    }

    fn submit_prompt(&mut self) {
        let prompt = self.input_buffer.trim().to_string();
        if prompt.is_empty() {
            return;
        }
        self.input_buffer.clear();
        self.send_user_turn(prompt);
    }

    fn save_canvas(&mut self) {
        match export::save_to_path(self.editor.document(), &self.export_path) {
            Ok(()) => {
                let message = format!("canvas saved to {}", self.export_path.display());
                self.log_diagnostic(message);
            }
            Err(err) => {
                tracing::warn!(error = %err, "canvas export failed");
                self.log_diagnostic(format!("failed to save canvas: {err}"));
            }
        }
    }

    fn drain_events(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(event) => self.apply_event(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.log_diagnostic("event channel disconnected");
                    break;
                }
            }
        }
    }

    fn apply_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::StreamFragment { exchange, text } => {
                self.chat.on_fragment(exchange, &text);
                self.scroll_to_bottom = true;
            }
            AppEvent::StreamEnd { exchange } => {
                let follow_up = self.chat.on_stream_end(exchange);
                self.dispatch(follow_up);
            }
            AppEvent::StreamFailed { exchange, message } => {
                self.log_diagnostic(format!("assistant service error: {message}"));
                let follow_up = self.chat.on_stream_failed(exchange);
                self.dispatch(follow_up);
                self.scroll_to_bottom = true;
            }
        }
    }

    fn apply_canvas_action(&mut self, action: CanvasAction) {
        let notification: Option<EditNotification> = match action {
            CanvasAction::Focus(slot) => {
                self.editor.focus(&slot);
                None
            }
            CanvasAction::Update(slot, value) => {
                self.editor.update_item(&slot, value);
                None
            }
            CanvasAction::Commit(slot) => self.editor.commit(&slot),
            CanvasAction::Add(list) => {
                self.focus_request = self.editor.add_item(&list);
                None
            }
            CanvasAction::Remove(slot) => {
                if self.focus_request.as_ref() == Some(&slot) {
                    self.focus_request = None;
                }
                self.editor
                    .document()
                    .position_of(&slot.list, slot.item)
                    .and_then(|index| self.editor.remove_item(&slot.list, index))
            }
            CanvasAction::FocusGranted => {
                self.focus_request = None;
                None
            }
        };

        if let Some(notification) = notification {
            let list = &notification.list;
            let section = resolve_title(
                self.editor.document().section_title(&list.section_id),
                list.subsection_title(),
                &list.section_id,
            )
            .to_string();
            self.log_diagnostic(format!(
                "canvas change: {} '{}' in {section}",
                notification.kind.verb().to_lowercase(),
                notification.value.trim()
            ));
            self.send_user_turn(notification.message);
        }
    }

    fn render_items(&self, ui: &mut egui::Ui, list: &SectionList<'_>, actions: &mut Vec<CanvasAction>) {
        for item in list.items {
            let slot = Slot::new(list.key.clone(), item.id());
            ui.horizontal(|ui| {
                let mut value = item.text().to_string();
                let hint = if self.editor.session().pending_new_item() == Some(&slot) {
                    "New item, press Enter to add"
                } else {
                    "Enter item..."
                };
                let response = ui.add(
                    egui::TextEdit::singleline(&mut value)
                        .hint_text(hint)
                        .desired_width((ui.available_width() - 28.0).max(40.0)),
                );

                if self.focus_request.as_ref() == Some(&slot) {
                    response.request_focus();
                    actions.push(CanvasAction::FocusGranted);
                }
                if response.gained_focus() {
                    actions.push(CanvasAction::Focus(slot.clone()));
                }
                if response.changed() {
                    actions.push(CanvasAction::Update(slot.clone(), value.clone()));
                }
                if response.lost_focus() {
                    actions.push(CanvasAction::Commit(slot.clone()));
                }

                let remove = ui
                    .small_button(RichText::new("−").color(self.theme.danger))
                    .on_hover_text("Remove item");
                if remove.clicked() {
                    actions.push(CanvasAction::Remove(slot.clone()));
                }
            });
        }

        if list.items.len() < MAX_ITEMS
            && ui
                .small_button(RichText::new("+ Add").color(self.theme.accent))
                .clicked()
        {
            actions.push(CanvasAction::Add(list.key.clone()));
        }
    }

    fn render_list_header(&self, ui: &mut egui::Ui, list: &SectionList<'_>) {
        ui.horizontal(|ui| {
            ui.label(RichText::new(list.title.to_uppercase()).strong().size(12.0));
            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                self.theme.chip_frame(self.theme.counter_fill).show(ui, |ui| {
                    ui.label(
                        RichText::new(format!("{}/{MAX_ITEMS}", list.items.len()))
                            .small()
                            .color(self.theme.text_muted),
                    );
                });
            });
        });
    }

    fn render_section(
        &self,
        ui: &mut egui::Ui,
        section: &Section,
        height: f32,
        actions: &mut Vec<CanvasAction>,
    ) {
        self.theme.section_frame(section.id()).show(ui, |ui| {
            ui.set_min_height(height);
            ui.set_width(ui.available_width());

            let lists = section.lists();
            let last = lists.len().saturating_sub(1);
            for (position, list) in lists.iter().enumerate() {
                self.render_list_header(ui, list);
                self.render_items(ui, list, actions);
                if position < last {
                    ui.separator();
                }
            }

            ui.with_layout(Layout::bottom_up(Align::Max), |ui| {
                self.theme.chip_frame(self.theme.badge_fill).show(ui, |ui| {
                    ui.label(
                        RichText::new(section.display_order().to_string())
                            .small()
                            .strong()
                            .color(self.theme.badge_text),
                    );
                });
            });
        });
    }

    fn render_section_by_id(
        &self,
        ui: &mut egui::Ui,
        section_id: &str,
        height: f32,
        actions: &mut Vec<CanvasAction>,
    ) {
        match self.editor.document().section(section_id) {
            Some(section) => self.render_section(ui, section, height, actions),
            None => {
                ui.label(RichText::new(format!("missing section {section_id}")).color(self.theme.danger));
            }
        }
    }

    fn render_canvas(&self, ui: &mut egui::Ui, actions: &mut Vec<CanvasAction>) {
        ui.columns(TOP_COLUMNS.len(), |columns| {
            for (column, section_ids) in columns.iter_mut().zip(TOP_COLUMNS) {
                let height = match section_ids.len() {
                    1 => ROW_HEIGHT * 2.0,
                    _ => ROW_HEIGHT,
                };
                for section_id in section_ids {
                    self.render_section_by_id(column, section_id, height, actions);
                }
            }
        });
        ui.columns(BOTTOM_ROW.len(), |columns| {
            for (column, section_id) in columns.iter_mut().zip(BOTTOM_ROW) {
                self.render_section_by_id(column, section_id, ROW_HEIGHT * 0.75, actions);
            }
        });
    }

    fn render_center_panel(&mut self, ctx: &egui::Context) {
        let mut actions = Vec::new();
        let mut save_now = false;
        egui::CentralPanel::default().show(ctx, |ui| {
            ScrollArea::vertical().id_salt("canvas_scroll").show(ui, |ui| {
                ui.vertical_centered(|ui| {
                    ui.heading(RichText::new("Lean Canvas Editor").strong());
                    ui.label(
                        RichText::new("Build your business model canvas").color(self.theme.text_muted),
                    );
                });
                ui.add_space(self.theme.spacing_12);

                self.theme.card_frame().show(ui, |ui| {
                    self.render_canvas(ui, &mut actions);
                });

                ui.add_space(self.theme.spacing_12);
                ui.vertical_centered(|ui| {
                    let save = egui::Button::new(
                        RichText::new("Save Canvas").color(self.theme.badge_text),
                    )
                    .fill(self.theme.accent);
                    save_now = ui.add(save).clicked();
                });
            });
        });

        for action in actions {
            self.apply_canvas_action(action);
        }
        if save_now {
            self.save_canvas();
        }
    }

    fn render_chat_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("chat_panel")
            .resizable(true)
            .default_width(360.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.strong("Assistant");
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        ui.label(
                            RichText::new(self.service_label.as_str())
                                .small()
                                .color(self.theme.text_muted),
                        );
                    });
                });
                ui.separator();

                let transcript_height = (ui.available_height() - 170.0).max(120.0);
                let open_turn = self.chat.transcript().open_turn_index();
                ScrollArea::vertical()
                    .id_salt("chat_transcript")
                    .max_height(transcript_height)
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        for (index, turn) in self.chat.transcript().turns().iter().enumerate() {
                            let (label, fill) = match turn.role {
                                Role::User => ("You", self.theme.user_bubble),
                                Role::Bot => ("Assistant", self.theme.bot_bubble),
                            };
                            self.theme.bubble_frame(fill).show(ui, |ui| {
                                ui.set_width(ui.available_width());
                                ui.label(
                                    RichText::new(format!("{label} · {}", turn.timestamp))
                                        .small()
                                        .color(self.theme.text_muted),
                                );
                                let mut content = turn.content.clone();
                                if open_turn == Some(index) {
                                    content.push_str(" ▍");
                                }
                                ui.label(content);
                            });
                        }

                        if self.chat.is_streaming() && open_turn.is_none() {
                            ui.label(RichText::new("Assistant is thinking...").color(self.theme.text_muted));
                        }
                        if self.scroll_to_bottom {
                            ui.scroll_to_cursor(Some(Align::BOTTOM));
                        }
                    });
                self.scroll_to_bottom = false;

                ui.separator();
                egui::CollapsingHeader::new("Diagnostics")
                    .default_open(false)
                    .show(ui, |ui| {
                        ScrollArea::vertical()
                            .id_salt("diagnostics_log")
                            .max_height(90.0)
                            .stick_to_bottom(true)
                            .show(ui, |ui| {
                                for entry in &self.diagnostics_log {
                                    ui.label(RichText::new(entry).small());
                                }
                            });
                    });

                ui.separator();
                let hint = if self.chat.has_follow_up_pending() {
                    "Queued, waiting for the current reply..."
                } else if self.chat.is_streaming() {
                    "Assistant is replying..."
                } else {
                    "Ask about your canvas..."
                };

                let mut send_now = false;
                ui.horizontal(|ui| {
                    let response = ui.add(
                        egui::TextEdit::singleline(&mut self.input_buffer)
                            .desired_width((ui.available_width() - 56.0).max(80.0))
                            .hint_text(hint),
                    );
                    if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                        send_now = true;
                    }

                    let clicked = ui
                        .add_enabled(
                            !self.input_buffer.trim().is_empty(),
                            egui::Button::new("Send"),
                        )
                        .clicked();
                    send_now |= clicked;
                });

                if send_now {
                    self.submit_prompt();
                }
            });
    }
}

impl eframe::App for LeanCanvasApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();
        self.render_chat_panel(ctx);
        self.render_center_panel(ctx);
        if self.chat.is_streaming() {
            ctx.request_repaint_after(Duration::from_millis(50));
        }
    }
}
