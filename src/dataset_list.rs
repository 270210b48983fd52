//! Renderers for the dataset list and the "Top Downloaded" ranking.
//!
//! Both are stateless; the caller passes the rows to show and a message
//! constructor for selection.

use iced::{
    Element, Length,
    widget::{Column, Space, button, column, container, row, rule, scrollable, text},
};

use crate::api::Dataset;
use crate::format::{format_size, short_hash};

pub fn view_dataset_list<'a, M: Clone + 'a>(
    datasets: &[&'a Dataset],
    selected_hash: Option<&str>,
    is_loading: bool,
    font_size: u32,
    on_select: impl Fn(Dataset) -> M,
) -> Element<'a, M> {
    let small = (font_size.saturating_sub(2)).max(8);
    let normal = font_size;

    let header = row![
        text("All Datasets").size(normal + 4),
        Space::new().width(Length::Fill),
        text(format!("{} dataset(s)", datasets.len())).size(small),
    ]
    .align_y(iced::Alignment::Center);

    if datasets.is_empty() {
        let body: Element<'a, M> = if is_loading {
            Space::new().height(Length::Fill).into()
        } else {
            container(text("No datasets found.").size(normal))
                .width(Length::Fill)
                .center_x(Length::Fill)
                .padding(30)
                .into()
        };
        return column![header, rule::horizontal(1), body].spacing(5).into();
    }

    let mut items: Vec<Element<'a, M>> = Vec::with_capacity(datasets.len() * 2);
    for &dataset in datasets {
        let is_selected = selected_hash == Some(dataset.hash.as_str());
        items.push(view_card(dataset, is_selected, font_size, on_select(dataset.clone())));
        items.push(rule::horizontal(1).into());
    }

    let list = scrollable(
        Column::with_children(items)
            .spacing(0)
            .padding(iced::Padding::ZERO.right(12)),
    )
    .height(Length::Fill);

    column![header, rule::horizontal(1), list].spacing(5).into()
}

fn view_card<'a, M: Clone + 'a>(
    dataset: &'a Dataset,
    is_selected: bool,
    font_size: u32,
    on_press: M,
) -> Element<'a, M> {
    let tiny = (font_size.saturating_sub(3)).max(7);
    let normal = font_size;

    let (badge, badge_color) = if dataset.is_active {
        ("● Active", iced::Color::from_rgb(0.2, 0.6, 0.3))
    } else {
        ("● Deregistered", iced::Color::from_rgb(0.8, 0.25, 0.25))
    };

    let card = row![
        column![
            text(&dataset.name).size(normal + 1),
            row![
                text(format_size(dataset.size_bytes))
                    .size(tiny)
                    .width(Length::Fixed(100.0)),
                text(short_hash(&dataset.hash))
                    .size(tiny)
                    .font(iced::Font::MONOSPACE),
            ]
            .spacing(10),
        ]
        .spacing(2)
        .width(Length::Fill),
        text(badge).size(tiny).color(badge_color),
    ]
    .align_y(iced::Alignment::Center);

    button(card)
        .on_press(on_press)
        .padding([8, 10])
        .width(Length::Fill)
        .style(if is_selected {
            button::secondary
        } else {
            button::text
        })
        .into()
}

pub fn view_top_datasets<'a, M: Clone + 'a>(
    top: &[&'a Dataset],
    font_size: u32,
    on_select: impl Fn(Dataset) -> M,
) -> Element<'a, M> {
    let small = (font_size.saturating_sub(2)).max(8);
    let normal = font_size;

    let mut items: Vec<Element<'a, M>> = vec![
        text("Top Downloaded").size(normal + 2).into(),
        rule::horizontal(1).into(),
    ];

    if top.is_empty() {
        items.push(
            text("No download data yet.")
                .size(small)
                .color(iced::Color::from_rgb(0.5, 0.5, 0.55))
                .into(),
        );
    }

    for (index, &dataset) in top.iter().enumerate() {
        let rank = index + 1;
        // Gold, silver, bronze, then plain
        let rank_color = match rank {
            1 => iced::Color::from_rgb(0.85, 0.65, 0.0),
            2 => iced::Color::from_rgb(0.55, 0.55, 0.6),
            3 => iced::Color::from_rgb(0.7, 0.45, 0.2),
            _ => iced::Color::from_rgb(0.4, 0.4, 0.4),
        };

        let entry = row![
            text(format!("{}.", rank))
                .size(small)
                .width(Length::Fixed(24.0))
                .color(rank_color),
            text(&dataset.name).size(normal).width(Length::Fill),
            text(format!("↓ {}", dataset.download_count)).size(small),
        ]
        .spacing(5)
        .align_y(iced::Alignment::Center);

        items.push(
            button(entry)
                .on_press(on_select(dataset.clone()))
                .padding([4, 8])
                .width(Length::Fill)
                .style(button::text)
                .into(),
        );
    }

    container(Column::with_children(items).spacing(6))
        .width(Length::Fill)
        .padding(15)
        .style(container::rounded_box)
        .into()
}
