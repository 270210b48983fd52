// Remove the windows_subsystem attribute during development to see console output
#![cfg_attr(target_os = "windows", windows_subsystem = "windows")]

use iced::{
    Element, Length, Task, Theme,
    widget::{
        Space, button, center, column, container, mouse_area, opaque, row, rule, stack, text,
        text_input, tooltip,
    },
};

mod api;
mod catalog;
mod dataset_list;
mod deregister;
mod detail;
mod error;
mod format;
mod settings;
mod upload;

use api::{ApiClient, Dataset};
use catalog::{Catalog, CatalogState};
use deregister::DELETE_SUCCEEDED;
use detail::{DatasetDetail, DetailMessage};
use error::ApiError;
use settings::{AppSettings, BASE_URL_ENV, ConnectionSettings};
use upload::{UploadDialog, UploadMessage};

pub fn main() -> iced::Result {
    // Initialize logger - show info level by default, debug if RUST_LOG is set
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    log::info!("===========================================");
    log::info!("Starting DataTrac Hub v{}", env!("CARGO_PKG_VERSION"));
    log::info!("===========================================");

    log::info!("Platform: {}", std::env::consts::OS);
    log::info!("Arch: {}", std::env::consts::ARCH);

    iced::application(DataTracHub::new, DataTracHub::update, DataTracHub::view)
        .title(DataTracHub::title)
        .theme(DataTracHub::theme)
        .window_size(iced::Size::new(1200.0, 800.0))
        .run()
}

#[derive(Debug, Clone)]
pub enum Message {
    // Header
    SearchChanged(String),
    Refresh,
    OpenUpload,

    // Collection
    DatasetsLoaded(Result<Vec<Dataset>, ApiError>),
    Select(Dataset),
    CatalogChanged(CatalogState),

    // Components
    Detail(DetailMessage),
    Upload(UploadMessage),

    // Connection
    BaseUrlChanged(String),
    ConnectPressed,

    DismissMessage,
}

#[derive(Debug, Clone)]
pub enum UserMessage {
    Error(String),
    Info(String),
}

pub struct DataTracHub {
    settings: AppSettings,
    client: Option<ApiClient>,
    catalog: Catalog,
    search_term: String,
    detail: DatasetDetail,
    upload: Option<UploadDialog>,
    base_url_input: String,
    user_message: Option<UserMessage>,
}

impl DataTracHub {
    fn new() -> (Self, Task<Message>) {
        log::info!("Initializing application...");

        let settings = match AppSettings::load() {
            Ok(s) => s,
            Err(e) => {
                log::warn!("Could not load settings: {:#}. Using defaults.", e);
                AppSettings::default()
            }
        }
        .with_base_url_override(std::env::var(BASE_URL_ENV).ok());

        let mut user_message = None;
        let client = match ApiClient::new(&settings.connection) {
            Ok(client) => {
                log::info!("Registry: {}", client.base_url());
                Some(client)
            }
            Err(e) => {
                log::warn!("Invalid registry address: {}", e);
                user_message = Some(UserMessage::Error(e.to_string()));
                None
            }
        };

        let mut app = Self {
            base_url_input: settings.connection.base_url.clone(),
            settings,
            client,
            catalog: Catalog::new(),
            search_term: String::new(),
            detail: DatasetDetail::new(),
            upload: None,
            user_message,
        };

        let watch = watch_catalog(&app.catalog);

        // Load the collection once at startup
        let task = app.refresh();
        (app, Task::batch(vec![watch, task]))
    }

    fn title(&self) -> String {
        match &self.client {
            Some(client) => format!("DataTrac Hub - {}", client.base_url()),
            None => "DataTrac Hub - Not connected".to_string(),
        }
    }

    fn theme(&self) -> Theme {
        Theme::Light
    }

    /// Start a list request. Selection changes never call this.
    fn refresh(&mut self) -> Task<Message> {
        self.catalog.begin_refresh();
        self.fetch_datasets()
    }

    fn fetch_datasets(&mut self) -> Task<Message> {
        match &self.client {
            Some(client) => {
                let client = client.clone();
                Task::perform(
                    async move { client.list_datasets().await },
                    Message::DatasetsLoaded,
                )
            }
            None => {
                self.catalog.finish_refresh(Err(ApiError::Validation(
                    "Not connected. Enter the registry address and press Connect.".to_string(),
                )));
                Task::none()
            }
        }
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        let previous = self.catalog.selected_hash().map(str::to_string);
        let task = self.handle_message(message);

        // The detail pane follows the selected hash only
        let current = self.catalog.selected_hash();
        if current == previous.as_deref() {
            return task;
        }
        match &self.client {
            Some(client) => {
                let follow = self
                    .detail
                    .selection_changed(current, client)
                    .map(Message::Detail);
                Task::batch(vec![task, follow])
            }
            None => task,
        }
    }

    fn handle_message(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::SearchChanged(value) => {
                self.search_term = value;
                Task::none()
            }

            Message::Refresh => self.refresh(),

            Message::DatasetsLoaded(result) => {
                self.catalog.finish_refresh(result);
                Task::none()
            }

            Message::Select(dataset) => {
                self.catalog.select(Some(dataset));
                Task::none()
            }

            Message::CatalogChanged(snapshot) => {
                log::debug!(
                    "Catalog now: {} dataset(s), selected {}, loading {}",
                    snapshot.datasets.len(),
                    snapshot
                        .selected
                        .as_ref()
                        .map(|d| format::short_hash(&d.hash))
                        .unwrap_or_else(|| "none".to_string()),
                    snapshot.is_loading
                );
                Task::none()
            }

            Message::Detail(msg) => self.handle_detail(msg),

            Message::OpenUpload => {
                self.upload = Some(UploadDialog::new());
                Task::none()
            }

            Message::Upload(UploadMessage::Close) => {
                self.upload = None;
                Task::none()
            }

            Message::Upload(msg) => {
                if let UploadMessage::Completed(Ok(dataset)) = &msg {
                    self.upload = None;
                    self.user_message =
                        Some(UserMessage::Info(format!("Uploaded {}", dataset.name)));
                    return self.refresh();
                }

                match (self.upload.as_mut(), &self.client) {
                    (Some(dialog), Some(client)) => dialog.update(msg, client).map(Message::Upload),
                    _ => Task::none(),
                }
            }

            Message::BaseUrlChanged(value) => {
                self.base_url_input = value;
                Task::none()
            }

            Message::ConnectPressed => {
                let connection = ConnectionSettings {
                    base_url: self.base_url_input.trim().to_string(),
                };

                match ApiClient::new(&connection) {
                    Ok(client) => {
                        log::info!("Connecting to {}", client.base_url());
                        self.user_message = Some(UserMessage::Info(format!(
                            "Connected to {}",
                            client.base_url()
                        )));
                        self.client = Some(client);
                        self.settings.connection = connection;
                        if let Err(e) = self.settings.save() {
                            log::warn!("Could not save settings: {:#}", e);
                        }
                        self.refresh()
                    }
                    Err(e) => {
                        // Keep the current client
                        log::warn!("Rejected registry address: {}", e);
                        self.user_message = Some(UserMessage::Error(e.to_string()));
                        Task::none()
                    }
                }
            }

            Message::DismissMessage => {
                self.user_message = None;
                Task::none()
            }
        }
    }

    fn handle_detail(&mut self, msg: DetailMessage) -> Task<Message> {
        let Some(client) = self.client.clone() else {
            return Task::none();
        };

        match &msg {
            // Patch the row in place, then re-select so the pane shows it too
            DetailMessage::DownloadRecorded(Ok(updated)) | DetailMessage::Reloaded(Ok(updated)) => {
                if self.catalog.apply_patch(updated.clone())
                    && self.catalog.is_selected(&updated.hash)
                {
                    self.catalog.select(Some(updated.clone()));
                }
            }
            DetailMessage::SelectLineage(hash) => {
                if !self.catalog.select_hash(hash) {
                    self.detail.set_notice(format!(
                        "Dataset {} is not in the current list.",
                        format::short_hash(hash)
                    ));
                }
                return Task::none();
            }
            _ => {}
        }

        let deleted = matches!(msg, DetailMessage::DeleteCompleted(Ok(())));
        let task = self
            .detail
            .update(msg, self.catalog.selected(), &client)
            .map(Message::Detail);

        if deleted {
            self.user_message = Some(UserMessage::Info(DELETE_SUCCEEDED.to_string()));
            self.catalog.handle_deletion();
            return Task::batch(vec![task, self.fetch_datasets()]);
        }
        task
    }

    // -------------------------------------------------------------------------
    // Views
    // -------------------------------------------------------------------------

    fn view(&self) -> Element<'_, Message> {
        let font_size = self.settings.preferences.font_size;

        let filtered = self.catalog.filter(&self.search_term);
        let top = self.catalog.top(self.settings.preferences.top_count);

        let list = dataset_list::view_dataset_list(
            &filtered,
            self.catalog.selected_hash(),
            self.catalog.is_loading(),
            font_size,
            Message::Select,
        );

        let aside = column![
            dataset_list::view_top_datasets(&top, font_size, Message::Select),
            self.detail
                .view(self.catalog.selected(), font_size)
                .map(Message::Detail),
        ]
        .spacing(15)
        .width(Length::FillPortion(1));

        let mut body = column![self.view_header(), self.view_connection_bar()].spacing(5);

        if let Some(banner) = self.view_banner() {
            body = body.push(banner);
        }

        let base: Element<'_, Message> = column![
            body,
            rule::horizontal(1),
            row![
                container(list)
                    .width(Length::FillPortion(2))
                    .height(Length::Fill),
                aside,
            ]
            .spacing(15)
            .padding([0, 10])
            .height(Length::Fill),
            rule::horizontal(1),
            self.view_status_bar(),
        ]
        .spacing(5)
        .padding(5)
        .into();

        if let Some(dialog) = &self.upload {
            return modal(
                base,
                dialog.view(font_size).map(Message::Upload),
                Message::Upload(UploadMessage::Close),
            );
        }

        if let Some(dialog) = self.detail.modal_view(self.catalog.selected(), font_size) {
            return modal(
                base,
                dialog.map(Message::Detail),
                Message::Detail(DetailMessage::CloseModal),
            );
        }

        base
    }

    fn view_header(&self) -> Element<'_, Message> {
        let normal = self.settings.preferences.font_size;

        row![
            text("DataTrac Hub").size(normal + 10),
            Space::new().width(Length::Fill),
            text_input("Search datasets...", &self.search_term)
                .on_input(Message::SearchChanged)
                .size(normal)
                .padding(6)
                .width(Length::Fixed(280.0)),
            tooltip(
                button(text("⟳ Refresh").size(normal))
                    .on_press(Message::Refresh)
                    .padding([6, 12]),
                "Refresh Datasets",
                tooltip::Position::Bottom,
            )
            .style(container::bordered_box),
            tooltip(
                button(text("Upload").size(normal))
                    .on_press(Message::OpenUpload)
                    .style(button::primary)
                    .padding([6, 12]),
                "Upload a new dataset",
                tooltip::Position::Bottom,
            )
            .style(container::bordered_box),
        ]
        .spacing(10)
        .padding(10)
        .align_y(iced::Alignment::Center)
        .into()
    }

    fn view_connection_bar(&self) -> Element<'_, Message> {
        let small = (self.settings.preferences.font_size.saturating_sub(2)).max(8);

        row![
            text("Registry:").size(small),
            text_input("http://127.0.0.1:8000", &self.base_url_input)
                .on_input(Message::BaseUrlChanged)
                .on_submit(Message::ConnectPressed)
                .size(small)
                .padding(4)
                .width(Length::Fixed(320.0)),
            button(text("Connect").size(small))
                .on_press(Message::ConnectPressed)
                .padding([4, 10]),
        ]
        .spacing(8)
        .padding([0, 10])
        .align_y(iced::Alignment::Center)
        .into()
    }

    fn view_banner(&self) -> Option<Element<'_, Message>> {
        let normal = self.settings.preferences.font_size;

        if self.catalog.is_loading() {
            return Some(
                container(
                    text("Loading datasets...")
                        .size(normal)
                        .color(iced::Color::from_rgb(0.15, 0.35, 0.8)),
                )
                .width(Length::Fill)
                .padding(8)
                .style(container::rounded_box)
                .into(),
            );
        }

        if let Some(error) = self.catalog.error() {
            return Some(
                container(
                    row![
                        text(format!("✕ {}", error))
                            .size(normal)
                            .color(iced::Color::from_rgb(0.75, 0.1, 0.1)),
                        Space::new().width(Length::Fill),
                        button(text("Retry").size(normal))
                            .on_press(Message::Refresh)
                            .padding([4, 10]),
                    ]
                    .align_y(iced::Alignment::Center),
                )
                .width(Length::Fill)
                .padding(8)
                .style(container::rounded_box)
                .into(),
            );
        }

        let (message, color) = match &self.user_message {
            Some(UserMessage::Error(msg)) => (msg, iced::Color::from_rgb(0.75, 0.1, 0.1)),
            Some(UserMessage::Info(msg)) => (msg, iced::Color::from_rgb(0.1, 0.5, 0.2)),
            None => return None,
        };

        Some(
            container(
                row![
                    text(message).size(normal).color(color),
                    Space::new().width(Length::Fill),
                    button(text("✕").size(normal))
                        .on_press(Message::DismissMessage)
                        .style(button::text)
                        .padding([2, 8]),
                ]
                .align_y(iced::Alignment::Center),
            )
            .width(Length::Fill)
            .padding(8)
            .style(container::rounded_box)
            .into(),
        )
    }

    fn view_status_bar(&self) -> Element<'_, Message> {
        let small = (self.settings.preferences.font_size.saturating_sub(2)).max(8);

        let total = self.catalog.datasets().len();
        let shown = if self.search_term.is_empty() {
            format!("{} dataset(s)", total)
        } else {
            format!(
                "{} of {} dataset(s) match '{}'",
                self.catalog.filter(&self.search_term).len(),
                total,
                self.search_term
            )
        };

        let connection = match &self.client {
            Some(client) => format!("Registry: {}", client.base_url()),
            None => "Not connected".to_string(),
        };

        row![
            text(shown).size(small),
            Space::new().width(Length::Fill),
            text(connection).size(small),
        ]
        .padding([2, 10])
        .into()
    }
}

/// Forward every catalog snapshot as a message for the lifetime of the app.
fn watch_catalog(catalog: &Catalog) -> Task<Message> {
    let receiver = catalog.subscribe();
    Task::run(
        iced::futures::stream::unfold(receiver, |mut rx| async move {
            rx.changed().await.ok()?;
            let snapshot = rx.borrow_and_update().clone();
            Some((snapshot, rx))
        }),
        Message::CatalogChanged,
    )
}

/// Overlay `content` centered on a dimmed `base`. Clicking outside sends
/// `on_blur`.
fn modal<'a>(
    base: Element<'a, Message>,
    content: Element<'a, Message>,
    on_blur: Message,
) -> Element<'a, Message> {
    stack![
        base,
        opaque(
            mouse_area(center(opaque(content)).style(|_theme| {
                container::Style {
                    background: Some(
                        iced::Color {
                            a: 0.6,
                            ..iced::Color::BLACK
                        }
                        .into(),
                    ),
                    ..container::Style::default()
                }
            }))
            .on_press(on_blur)
        )
    ]
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deregister::DeleteStage;
    use crate::error::ErrorKind;

    fn ds(hash: &str, downloads: u64) -> Dataset {
        Dataset {
            hash: hash.to_string(),
            name: format!("{}.csv", hash),
            source: None,
            registry_path: format!("/registry/{}.csv", hash),
            created_at: None,
            is_active: true,
            size_bytes: Some(1024),
            download_count: downloads,
            last_downloaded_at: None,
        }
    }

    fn app_with(datasets: Vec<Dataset>) -> DataTracHub {
        let settings = AppSettings::default();
        let mut app = DataTracHub {
            client: ApiClient::new(&settings.connection).ok(),
            base_url_input: settings.connection.base_url.clone(),
            settings,
            catalog: Catalog::new(),
            search_term: String::new(),
            detail: DatasetDetail::new(),
            upload: None,
            user_message: None,
        };
        app.catalog.begin_refresh();
        app.catalog.finish_refresh(Ok(datasets));
        app
    }

    fn send(app: &mut DataTracHub, msg: DetailMessage) {
        let _ = app.update(Message::Detail(msg));
    }

    fn submit_delete(app: &mut DataTracHub, password: &str) {
        send(app, DetailMessage::RequestDelete);
        send(app, DetailMessage::ConfirmDelete);
        send(app, DetailMessage::PasswordChanged(password.to_string()));
        send(app, DetailMessage::SubmitDelete);
        assert!(matches!(
            app.detail.delete_stage(),
            DeleteStage::Submitting(_)
        ));
    }

    #[test]
    fn test_download_result_patches_row_and_selection() {
        let mut app = app_with(vec![ds("a", 3), ds("b", 1)]);
        let _ = app.update(Message::Select(ds("a", 3)));

        send(&mut app, DetailMessage::RequestDownload);
        send(&mut app, DetailMessage::DownloadRecorded(Ok(ds("a", 4))));

        assert_eq!(app.catalog.datasets()[0].download_count, 4);
        assert_eq!(app.catalog.selected().map(|d| d.download_count), Some(4));
        assert_eq!(app.catalog.datasets().len(), 2);
    }

    #[test]
    fn test_patch_for_other_dataset_keeps_selection() {
        let mut app = app_with(vec![ds("a", 3), ds("b", 1)]);
        let _ = app.update(Message::Select(ds("b", 1)));

        send(&mut app, DetailMessage::DownloadRecorded(Ok(ds("a", 9))));

        assert_eq!(app.catalog.datasets()[0].download_count, 9);
        assert_eq!(app.catalog.selected_hash(), Some("b"));
        assert_eq!(app.catalog.selected().map(|d| d.download_count), Some(1));
    }

    #[test]
    fn test_rejected_password_leaves_catalog_alone() {
        let mut app = app_with(vec![ds("a", 3)]);
        let _ = app.update(Message::Select(ds("a", 3)));
        submit_delete(&mut app, "wrong");

        send(
            &mut app,
            DetailMessage::DeleteCompleted(Err(ApiError::InvalidPassword)),
        );

        assert_eq!(app.catalog.datasets(), &[ds("a", 3)]);
        assert_eq!(app.catalog.selected_hash(), Some("a"));
        assert!(!app.catalog.is_loading());
        assert!(app.user_message.is_none());
        match app.detail.delete_stage() {
            DeleteStage::Failed { kind, message, .. } => {
                assert_eq!(*kind, ErrorKind::Auth);
                assert_eq!(message, "Invalid admin password.");
            }
            other => panic!("unexpected stage {:?}", other),
        }
    }

    #[test]
    fn test_successful_delete_clears_selection_before_refresh() {
        let mut app = app_with(vec![ds("a", 3), ds("b", 1)]);
        let _ = app.update(Message::Select(ds("a", 3)));
        submit_delete(&mut app, "secret");

        send(&mut app, DetailMessage::DeleteCompleted(Ok(())));

        // List request is in flight, selection already gone
        assert_eq!(app.catalog.selected(), None);
        assert!(app.catalog.is_loading());
        assert!(matches!(
            &app.user_message,
            Some(UserMessage::Info(msg)) if msg == DELETE_SUCCEEDED
        ));

        let _ = app.update(Message::DatasetsLoaded(Ok(vec![ds("b", 1)])));
        assert!(!app.catalog.is_loading());
        assert_eq!(app.catalog.selected(), None);

        // A failed refresh does not bring the selection back either
        let _ = app.update(Message::Refresh);
        let _ = app.update(Message::DatasetsLoaded(Err(ApiError::Transport(
            "refused".to_string(),
        ))));
        assert_eq!(app.catalog.selected(), None);
    }

    #[test]
    fn test_lineage_link_selects_known_dataset() {
        let mut app = app_with(vec![ds("a", 3), ds("b", 1)]);
        let _ = app.update(Message::Select(ds("a", 3)));

        send(&mut app, DetailMessage::SelectLineage("b".to_string()));
        assert_eq!(app.catalog.selected_hash(), Some("b"));
        assert_eq!(app.detail.notice(), None);
    }

    #[test]
    fn test_lineage_link_outside_collection_shows_notice() {
        let mut app = app_with(vec![ds("a", 3)]);
        let _ = app.update(Message::Select(ds("a", 3)));

        send(
            &mut app,
            DetailMessage::SelectLineage("0123456789abcdef".to_string()),
        );
        assert_eq!(app.catalog.selected_hash(), Some("a"));
        assert_eq!(
            app.detail.notice(),
            Some("Dataset 01234567... is not in the current list.")
        );
    }

    #[test]
    fn test_invalid_base_url_keeps_client() {
        let mut app = app_with(vec![]);
        app.base_url_input = "not a url".to_string();
        let _ = app.update(Message::ConnectPressed);

        assert!(matches!(app.user_message, Some(UserMessage::Error(_))));
        assert_eq!(
            app.client.as_ref().map(|c| c.base_url().as_str()),
            Some("http://127.0.0.1:8000/")
        );
    }

    #[test]
    fn test_catalog_snapshot_does_not_feed_back() {
        let mut app = app_with(vec![ds("a", 3)]);
        let mut rx = app.catalog.subscribe();

        let _ = app.update(Message::Select(ds("a", 3)));
        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.selected.map(|d| d.hash), Some("a".to_string()));

        // Handling a snapshot changes nothing, so it publishes nothing
        let current = app.catalog.subscribe().borrow().clone();
        let _ = app.update(Message::CatalogChanged(current));
        assert!(!rx.has_changed().unwrap());
        assert!(!app.catalog.is_loading());
    }
}
