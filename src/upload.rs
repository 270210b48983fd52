//! Upload dialog: pick a file, optionally name its source, send it to the
//! registry. All state here is local and dropped when the dialog closes.

use iced::{
    Element, Length, Task,
    widget::{Space, button, column, container, row, rule, text, text_input},
};
use std::path::PathBuf;

use crate::api::{ApiClient, Dataset};
use crate::error::ApiError;

const UPLOAD_FAILED: &str = "Upload failed";

#[derive(Debug, Clone)]
pub enum UploadMessage {
    PickFile,
    FilePicked(Option<PathBuf>),
    SourceChanged(String),
    Submit,
    Completed(Result<Dataset, ApiError>),
    Close,
}

#[derive(Debug, Default)]
pub struct UploadDialog {
    file: Option<PathBuf>,
    source: String,
    is_uploading: bool,
    error: Option<String>,
}

impl UploadDialog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, message: UploadMessage, client: &ApiClient) -> Task<UploadMessage> {
        match message {
            UploadMessage::PickFile => Task::perform(
                async {
                    rfd::AsyncFileDialog::new()
                        .set_title("Select Dataset File")
                        .pick_file()
                        .await
                        .map(|handle| handle.path().to_path_buf())
                },
                UploadMessage::FilePicked,
            ),

            UploadMessage::FilePicked(path) => {
                if let Some(path) = path {
                    log::debug!("Upload file selected: {}", path.display());
                    self.file = Some(path);
                    self.error = None;
                }
                Task::none()
            }

            UploadMessage::SourceChanged(value) => {
                self.source = value;
                Task::none()
            }

            UploadMessage::Submit => match self.prepare_submit() {
                Some((path, source)) => {
                    let client = client.clone();
                    Task::perform(
                        async move { client.upload_dataset(&path, source.as_deref()).await },
                        UploadMessage::Completed,
                    )
                }
                None => Task::none(),
            },

            UploadMessage::Completed(result) => {
                self.finish(&result);
                Task::none()
            }

            // Closing is handled by the owner, which drops the dialog
            UploadMessage::Close => Task::none(),
        }
    }

    /// Validate the form and mark the upload as in flight. Returns the file
    /// and trimmed source to send.
    fn prepare_submit(&mut self) -> Option<(PathBuf, Option<String>)> {
        if self.is_uploading {
            return None;
        }

        let Some(path) = self.file.clone() else {
            self.error = Some("Please select a file to upload.".to_string());
            return None;
        };

        let source = Some(self.source.trim().to_string()).filter(|s| !s.is_empty());
        self.is_uploading = true;
        self.error = None;
        Some((path, source))
    }

    fn finish(&mut self, result: &Result<Dataset, ApiError>) {
        self.is_uploading = false;
        match result {
            Ok(dataset) => log::info!("Uploaded {} ({})", dataset.name, dataset.hash),
            Err(e) => {
                log::warn!("Upload failed: {}", e);
                self.error = Some(e.user_message(UPLOAD_FAILED));
            }
        }
    }

    pub fn view(&self, font_size: u32) -> Element<'_, UploadMessage> {
        let small = (font_size.saturating_sub(2)).max(8);
        let normal = font_size;

        let file_label = match &self.file {
            Some(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string()),
            None => "Any file type".to_string(),
        };

        let file_row = row![
            button(text("Select a file").size(normal))
                .on_press_maybe((!self.is_uploading).then_some(UploadMessage::PickFile))
                .padding([6, 12]),
            text(file_label)
                .size(small)
                .color(iced::Color::from_rgb(0.4, 0.4, 0.45)),
        ]
        .spacing(10)
        .align_y(iced::Alignment::Center);

        let source_input = text_input("https://example.com/data_source", &self.source)
            .on_input(UploadMessage::SourceChanged)
            .on_submit(UploadMessage::Submit)
            .size(normal)
            .padding(6);

        let mut content = column![
            text("Upload New Dataset").size(normal + 4),
            rule::horizontal(1),
            text("Dataset File*").size(small),
            file_row,
            text("Source URL (Optional)").size(small),
            source_input,
        ]
        .spacing(8);

        if let Some(error) = &self.error {
            content = content.push(
                text(error)
                    .size(small)
                    .color(iced::Color::from_rgb(0.85, 0.2, 0.2)),
            );
        }

        let submit_label = if self.is_uploading {
            "Uploading..."
        } else {
            "Upload"
        };

        content = content.push(
            row![
                Space::new().width(Length::Fill),
                button(text("Cancel").size(normal))
                    .on_press(UploadMessage::Close)
                    .style(button::secondary)
                    .padding([6, 12]),
                button(text(submit_label).size(normal))
                    .on_press_maybe((!self.is_uploading).then_some(UploadMessage::Submit))
                    .style(button::primary)
                    .padding([6, 12]),
            ]
            .spacing(10),
        );

        container(content)
            .width(Length::Fixed(480.0))
            .padding(20)
            .style(container::rounded_box)
            .into()
    }
}
