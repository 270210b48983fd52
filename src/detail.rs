//! Detail pane for the selected dataset.
//!
//! Shows the dataset's metadata and lineage and drives the per-dataset
//! actions:
//! - Request download (records the download server-side, then shows the
//!   retrieval command)
//! - Reload the single record from the registry
//! - Deregister with the admin password
//!
//! The pane keeps only short-lived local state. Server responses that change
//! the collection are picked up by the owner from the completion messages.

use iced::{
    Element, Length, Task,
    widget::{Column, Space, button, column, container, row, rule, scrollable, text, text_input, tooltip},
};

use crate::api::{ApiClient, Dataset, Lineage, LineageEntry};
use crate::deregister::{CONFIRM_PROMPT, DELETE_SUCCEEDED, DeleteFlow, DeleteStage};
use crate::error::{ApiError, ErrorKind};
use crate::format::{NOT_AVAILABLE, format_date_time, format_size};

const DOWNLOAD_FAILED: &str = "Failed to update download stats.";
const RELOAD_FAILED: &str = "Failed to reload dataset.";

#[derive(Debug, Clone)]
pub enum DetailMessage {
    // Download
    RequestDownload,
    DownloadRecorded(Result<Dataset, ApiError>),
    CloseDownloadModal,
    CopyCommand(String),

    // Single record reload
    Reload,
    Reloaded(Result<Dataset, ApiError>),

    // Deregister
    RequestDelete,
    ConfirmDelete,
    PasswordChanged(String),
    SubmitDelete,
    DeleteCompleted(Result<(), ApiError>),
    RetryDelete,
    CancelDelete,

    // Lineage
    LineageLoaded(String, Result<Lineage, ApiError>),
    SelectLineage(String),

    CloseModal,
    DismissNotice,
}

#[derive(Debug, Clone, Default)]
enum LineageState {
    #[default]
    Idle,
    Loading,
    Loaded(Lineage),
    Failed(String),
}

#[derive(Debug, Default)]
pub struct DatasetDetail {
    lineage_for: Option<String>,
    lineage: LineageState,
    is_recording: bool,
    is_reloading: bool,
    show_download_modal: bool,
    copied: bool,
    delete: DeleteFlow,
    notice: Option<String>,
}

impl DatasetDetail {
    pub fn new() -> Self {
        Self {
            delete: DeleteFlow::new(),
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub fn delete_stage(&self) -> &DeleteStage {
        self.delete.stage()
    }

    #[cfg(test)]
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Reset local state for a new selection and load its lineage.
    pub fn selection_changed(
        &mut self,
        hash: Option<&str>,
        client: &ApiClient,
    ) -> Task<DetailMessage> {
        self.show_download_modal = false;
        self.copied = false;
        self.is_recording = false;
        self.is_reloading = false;
        self.notice = None;
        self.delete.cancel();
        self.lineage_for = hash.map(str::to_string);

        let Some(hash) = hash else {
            self.lineage = LineageState::Idle;
            return Task::none();
        };

        self.lineage = LineageState::Loading;
        let hash = hash.to_string();
        let client = client.clone();
        Task::perform(
            async move {
                let result = client.get_lineage(&hash).await;
                (hash, result)
            },
            |(hash, result)| DetailMessage::LineageLoaded(hash, result),
        )
    }

    pub fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
    }

    pub fn update(
        &mut self,
        message: DetailMessage,
        selected: Option<&Dataset>,
        client: &ApiClient,
    ) -> Task<DetailMessage> {
        match message {
            DetailMessage::RequestDownload => {
                let Some(dataset) = selected.filter(|d| d.is_active) else {
                    return Task::none();
                };
                if self.is_recording {
                    return Task::none();
                }

                self.is_recording = true;
                self.notice = None;
                let hash = dataset.hash.clone();
                let client = client.clone();
                Task::perform(
                    async move { client.mark_downloaded(&hash).await },
                    DetailMessage::DownloadRecorded,
                )
            }

            DetailMessage::DownloadRecorded(result) => {
                self.is_recording = false;
                match result {
                    Ok(updated) => {
                        // Only for the dataset still on screen
                        if selected.is_some_and(|d| d.hash == updated.hash) {
                            self.copied = false;
                            self.show_download_modal = true;
                        }
                    }
                    Err(e) => {
                        log::warn!("Recording download failed: {}", e);
                        self.notice = Some(e.generic_message(DOWNLOAD_FAILED));
                    }
                }
                Task::none()
            }

            DetailMessage::CloseDownloadModal => {
                self.show_download_modal = false;
                Task::none()
            }

            DetailMessage::CopyCommand(command) => {
                self.copied = true;
                iced::clipboard::write(command)
            }

            DetailMessage::Reload => {
                let Some(dataset) = selected else {
                    return Task::none();
                };
                self.is_reloading = true;
                let hash = dataset.hash.clone();
                let client = client.clone();
                Task::perform(
                    async move { client.get_dataset(&hash).await },
                    DetailMessage::Reloaded,
                )
            }

            DetailMessage::Reloaded(result) => {
                self.is_reloading = false;
                if let Err(e) = result {
                    log::warn!("Reloading dataset failed: {}", e);
                    self.notice = Some(e.user_message(RELOAD_FAILED));
                }
                Task::none()
            }

            DetailMessage::RequestDelete => {
                if let Some(dataset) = selected {
                    self.delete.request(&dataset.hash, &dataset.name);
                }
                Task::none()
            }

            DetailMessage::ConfirmDelete => {
                self.delete.confirm();
                Task::none()
            }

            DetailMessage::PasswordChanged(value) => {
                self.delete.password_changed(value);
                Task::none()
            }

            DetailMessage::SubmitDelete => match self.delete.submit() {
                Some(request) => {
                    let client = client.clone();
                    Task::perform(
                        async move {
                            client
                                .delete_dataset(&request.hash, &request.password)
                                .await
                        },
                        DetailMessage::DeleteCompleted,
                    )
                }
                None => Task::none(),
            },

            DetailMessage::DeleteCompleted(result) => {
                self.delete.complete(&result);
                Task::none()
            }

            DetailMessage::RetryDelete => {
                self.delete.retry();
                Task::none()
            }

            DetailMessage::CancelDelete => {
                self.delete.cancel();
                Task::none()
            }

            DetailMessage::LineageLoaded(hash, result) => {
                // Drop answers for a selection that is no longer shown
                if self.lineage_for.as_deref() != Some(hash.as_str()) {
                    return Task::none();
                }
                self.lineage = match result {
                    Ok(lineage) => LineageState::Loaded(lineage),
                    Err(e) => {
                        log::warn!("Loading lineage for {} failed: {}", hash, e);
                        LineageState::Failed(e.user_message("Failed to load lineage."))
                    }
                };
                Task::none()
            }

            // Resolved by the owner against the collection
            DetailMessage::SelectLineage(_) => Task::none(),

            DetailMessage::CloseModal => {
                self.show_download_modal = false;
                self.delete.cancel();
                Task::none()
            }

            DetailMessage::DismissNotice => {
                self.notice = None;
                Task::none()
            }
        }
    }

    // -------------------------------------------------------------------------
    // Views
    // -------------------------------------------------------------------------

    pub fn view<'a>(
        &'a self,
        dataset: Option<&'a Dataset>,
        font_size: u32,
    ) -> Element<'a, DetailMessage> {
        let small = (font_size.saturating_sub(2)).max(8);
        let normal = font_size;

        let Some(dataset) = dataset else {
            return container(text("Select a dataset to view details.").size(normal + 2))
                .width(Length::Fill)
                .height(Length::Fixed(200.0))
                .center_x(Length::Fill)
                .center_y(Length::Fixed(200.0))
                .style(container::rounded_box)
                .into();
        };

        let fields = column![
            field_row("Hash:", dataset.hash.clone(), small),
            field_row("Size:", format_size(dataset.size_bytes), small),
            field_row(
                "Source:",
                dataset
                    .source
                    .clone()
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                small
            ),
            field_row(
                "Created:",
                format_date_time(dataset.created_at.as_deref()),
                small
            ),
            field_row("Downloads:", dataset.download_count.to_string(), small),
            field_row(
                "Last DL:",
                format_date_time(dataset.last_downloaded_at.as_deref()),
                small
            ),
        ]
        .spacing(6);

        let download_label = if self.is_recording {
            "Recording..."
        } else {
            "Request Download"
        };
        let can_download = dataset.is_active && !self.is_recording;

        let actions = row![
            button(text(download_label).size(normal))
                .on_press_maybe(can_download.then_some(DetailMessage::RequestDownload))
                .style(button::primary)
                .padding([8, 12])
                .width(Length::Fill),
            tooltip(
                button(text(if self.is_reloading { "..." } else { "⟳" }).size(normal))
                    .on_press_maybe((!self.is_reloading).then_some(DetailMessage::Reload))
                    .padding([8, 12]),
                "Reload this dataset from the registry",
                tooltip::Position::Top,
            )
            .style(container::bordered_box),
            tooltip(
                button(text("🗑").size(normal))
                    .on_press(DetailMessage::RequestDelete)
                    .style(button::danger)
                    .padding([8, 12]),
                "Deregister dataset from the central registry (Admin)",
                tooltip::Position::Top,
            )
            .style(container::bordered_box),
        ]
        .spacing(8);

        let mut content = column![
            text(&dataset.name).size(normal + 6),
            rule::horizontal(1),
            fields,
            actions,
        ]
        .spacing(10);

        if !dataset.is_active {
            content = content.push(
                text("This dataset is deregistered and can no longer be downloaded.")
                    .size(small)
                    .color(iced::Color::from_rgb(0.8, 0.3, 0.3)),
            );
        }

        if let Some(notice) = &self.notice {
            content = content.push(
                row![
                    text(notice)
                        .size(small)
                        .color(iced::Color::from_rgb(0.85, 0.2, 0.2))
                        .width(Length::Fill),
                    button(text("✕").size(small))
                        .on_press(DetailMessage::DismissNotice)
                        .style(button::text)
                        .padding([2, 6]),
                ]
                .align_y(iced::Alignment::Center),
            );
        }

        content = content.push(rule::horizontal(1));
        content = content.push(self.view_lineage(font_size));

        container(scrollable(content).height(Length::Shrink))
            .width(Length::Fill)
            .padding(15)
            .style(container::rounded_box)
            .into()
    }

    fn view_lineage(&self, font_size: u32) -> Element<'_, DetailMessage> {
        let small = (font_size.saturating_sub(2)).max(8);
        let tiny = (font_size.saturating_sub(3)).max(7);
        let muted = iced::Color::from_rgb(0.5, 0.5, 0.55);

        let lineage = match &self.lineage {
            LineageState::Idle => return Space::new().height(0).into(),
            LineageState::Loading => {
                return text("Loading lineage...").size(small).color(muted).into();
            }
            LineageState::Failed(e) => {
                return text(e.as_str()).size(small).color(muted).into();
            }
            LineageState::Loaded(lineage) => lineage,
        };

        if lineage.is_empty() {
            return text("No lineage information available.")
                .size(small)
                .color(muted)
                .into();
        }

        let mut items: Vec<Element<'_, DetailMessage>> =
            vec![text("Dataset Lineage").size(font_size).into()];

        if !lineage.parents.is_empty() {
            items.push(text("Parents (Derived From)").size(tiny).color(muted).into());
            items.extend(lineage.parents.iter().map(|p| lineage_link("↖", p, small)));
        }
        if !lineage.children.is_empty() {
            items.push(text("Children (Derived To)").size(tiny).color(muted).into());
            items.extend(lineage.children.iter().map(|c| lineage_link("↘", c, small)));
        }

        Column::with_children(items).spacing(4).into()
    }

    /// The download or deregister dialog, when one is open.
    pub fn modal_view<'a>(
        &'a self,
        dataset: Option<&'a Dataset>,
        font_size: u32,
    ) -> Option<Element<'a, DetailMessage>> {
        if self.show_download_modal {
            if let Some(dataset) = dataset {
                return Some(self.view_download_modal(dataset, font_size));
            }
        }
        self.view_delete_modal(font_size)
    }

    fn view_download_modal<'a>(
        &'a self,
        dataset: &'a Dataset,
        font_size: u32,
    ) -> Element<'a, DetailMessage> {
        let small = (font_size.saturating_sub(2)).max(8);
        let normal = font_size;
        let command = dataset.retrieval_command();

        let content = column![
            text("Download Dataset").size(normal + 4),
            rule::horizontal(1),
            text("Stats updated. To download, copy this command into your terminal:").size(small),
            container(text(command.clone()).size(small).font(iced::Font::MONOSPACE))
                .padding(10)
                .width(Length::Fill)
                .style(container::bordered_box),
            row![
                Space::new().width(Length::Fill),
                button(text(if self.copied { "Copied" } else { "Copy" }).size(normal))
                    .on_press(DetailMessage::CopyCommand(command))
                    .padding([6, 12]),
                button(text("Close").size(normal))
                    .on_press(DetailMessage::CloseDownloadModal)
                    .style(button::primary)
                    .padding([6, 12]),
            ]
            .spacing(10),
        ]
        .spacing(10);

        dialog(content)
    }

    fn view_delete_modal(&self, font_size: u32) -> Option<Element<'_, DetailMessage>> {
        let small = (font_size.saturating_sub(2)).max(8);
        let normal = font_size;
        let red = iced::Color::from_rgb(0.85, 0.2, 0.2);

        let cancel = || {
            button(text("Cancel").size(normal))
                .on_press(DetailMessage::CancelDelete)
                .style(button::secondary)
                .padding([6, 12])
        };

        let content: Column<'_, DetailMessage> = match self.delete.stage() {
            DeleteStage::Idle => return None,

            DeleteStage::PendingDelete(target) => column![
                text(format!("Deregister {}", target.name)).size(normal + 4),
                rule::horizontal(1),
                text(CONFIRM_PROMPT).size(small),
                row![
                    Space::new().width(Length::Fill),
                    cancel(),
                    button(text("Continue").size(normal))
                        .on_press(DetailMessage::ConfirmDelete)
                        .style(button::danger)
                        .padding([6, 12]),
                ]
                .spacing(10),
            ],

            DeleteStage::AwaitingPassword {
                target,
                password,
                error,
            } => {
                let mut col = column![
                    text(format!("Deregister {}", target.name)).size(normal + 4),
                    rule::horizontal(1),
                    text("Please enter the admin password to proceed:").size(small),
                    text_input("Admin password", password)
                        .secure(true)
                        .on_input(DetailMessage::PasswordChanged)
                        .on_submit(DetailMessage::SubmitDelete)
                        .size(normal)
                        .padding(6),
                ];
                if let Some(error) = error {
                    col = col.push(text(error).size(small).color(red));
                }
                col.push(
                    row![
                        Space::new().width(Length::Fill),
                        cancel(),
                        button(text("Deregister").size(normal))
                            .on_press(DetailMessage::SubmitDelete)
                            .style(button::danger)
                            .padding([6, 12]),
                    ]
                    .spacing(10),
                )
            }

            DeleteStage::Submitting(target) => column![
                text(format!("Deregister {}", target.name)).size(normal + 4),
                rule::horizontal(1),
                text("Deregistering...").size(small),
            ],

            DeleteStage::Done(target) => column![
                text(format!("Deregister {}", target.name)).size(normal + 4),
                rule::horizontal(1),
                text(DELETE_SUCCEEDED).size(small),
            ],

            DeleteStage::Failed {
                target,
                kind,
                message,
            } => {
                let heading = if *kind == ErrorKind::Auth {
                    "Authentication failed"
                } else {
                    "Deregistering failed"
                };
                column![
                    text(format!("Deregister {}", target.name)).size(normal + 4),
                    rule::horizontal(1),
                    text(heading).size(normal).color(red),
                    text(format!("Error: {}", message)).size(small),
                    row![
                        Space::new().width(Length::Fill),
                        button(text("Close").size(normal))
                            .on_press(DetailMessage::CancelDelete)
                            .style(button::secondary)
                            .padding([6, 12]),
                        button(text("Retry").size(normal))
                            .on_press(DetailMessage::RetryDelete)
                            .style(button::primary)
                            .padding([6, 12]),
                    ]
                    .spacing(10),
                ]
            }
        };

        Some(dialog(content.spacing(10)))
    }
}

fn dialog<'a>(content: Column<'a, DetailMessage>) -> Element<'a, DetailMessage> {
    container(content)
        .width(Length::Fixed(520.0))
        .padding(20)
        .style(container::rounded_box)
        .into()
}

fn field_row<'a>(label: &'a str, value: String, size: u32) -> Element<'a, DetailMessage> {
    row![
        text(label).size(size).width(Length::Fixed(90.0)),
        text(value).size(size).width(Length::Fill),
    ]
    .spacing(5)
    .into()
}

fn lineage_link<'a>(
    arrow: &'a str,
    entry: &'a LineageEntry,
    size: u32,
) -> Element<'a, DetailMessage> {
    row![
        text(arrow).size(size),
        button(text(&entry.name).size(size))
            .on_press(DetailMessage::SelectLineage(entry.hash.clone()))
            .style(button::text)
            .padding([2, 6]),
    ]
    .spacing(4)
    .align_y(iced::Alignment::Center)
    .into()
}
