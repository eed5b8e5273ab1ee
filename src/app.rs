use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use eframe::egui;
use log::{info, warn};
use rfd::FileDialog;
use walkdir::WalkDir;

use crate::caption::CaptionItem;
use crate::config::AppConfig;
use crate::folder_history::FolderHistory;
use crate::tag_index::TagIndex;

const FEEDBACK_SECS: u64 = 3;

enum PreviewMessage {
    Decoded {
        idx: usize,
        width: usize,
        height: usize,
        pixels: Vec<u8>,
    },
    Failed {
        idx: usize,
        error: String,
    },
}

/// The one UI thread owns everything here. Pending caption edits are
/// committed before the current image or folder changes and before exit;
/// the only background work is preview decoding, which never touches
/// application state directly.
pub struct TaggerApp {
    config: AppConfig,
    folder_history: FolderHistory,
    history_entries: Vec<String>,
    folder_input: String,
    current_folder: Option<PathBuf>,

    tag_index: TagIndex,
    sorted_tags: Vec<(u64, String)>,

    items: Vec<CaptionItem>,
    current_idx: usize,
    caption_text: String,

    current_texture: Option<egui::TextureHandle>,
    texture_cache: HashMap<usize, egui::TextureHandle>,
    preview_receiver: Option<mpsc::Receiver<PreviewMessage>>,
    previews_done: usize,

    feedback: Option<(String, Instant)>,
    shutdown_committed: bool,
}

impl TaggerApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: AppConfig) -> Self {
        let folder_history = FolderHistory::new(&config);
        let history_entries = folder_history.load();
        let folder_input = history_entries.first().cloned().unwrap_or_default();
        let tag_index = TagIndex::new(&config);

        Self {
            config,
            folder_history,
            history_entries,
            folder_input,
            current_folder: None,
            tag_index,
            sorted_tags: Vec::new(),
            items: Vec::new(),
            current_idx: 0,
            caption_text: String::new(),
            current_texture: None,
            texture_cache: HashMap::new(),
            preview_receiver: None,
            previews_done: 0,
            feedback: None,
            shutdown_committed: false,
        }
    }

    fn set_feedback(&mut self, message: impl Into<String>) {
        self.feedback = Some((message.into(), Instant::now()));
    }

    /// Write the pending caption edit through the store and fold it into the
    /// tag index. Must run before navigation, folder switch, and exit.
    fn commit_current(&mut self) {
        let Some(item) = self.items.get_mut(self.current_idx) else {
            return;
        };
        if self.caption_text == item.caption {
            return;
        }
        let clean = item.save(&self.caption_text);
        self.tag_index.update(&clean);
        self.sorted_tags = self.tag_index.sorted_tags();
        self.caption_text = item.caption.clone();
    }

    fn open_folder(&mut self, ctx: &egui::Context) {
        let folder_str = self.folder_input.trim().to_string();
        if folder_str.is_empty() {
            notice("Notice", "Enter or select a folder path first.");
            return;
        }
        let folder = PathBuf::from(&folder_str);
        if !folder.is_dir() {
            notice("Error", &format!("Folder does not exist: {folder_str}"));
            return;
        }

        self.commit_current();
        // Persist the outgoing folder's counts before the scope switches.
        if self.current_folder.is_some() {
            self.tag_index.save();
        }

        self.folder_history.save(&folder_str);
        self.history_entries = self.folder_history.load();

        self.tag_index.set_folder(&folder);
        self.sorted_tags = self.tag_index.sorted_tags();
        self.current_folder = Some(folder.clone());

        self.items = scan_images(&folder, &self.config)
            .into_iter()
            .map(CaptionItem::new)
            .collect();
        self.current_idx = 0;
        self.texture_cache.clear();
        self.current_texture = None;
        self.caption_text = String::new();

        if self.items.is_empty() {
            self.preview_receiver = None;
            notice(
                "Notice",
                &format!(
                    "No supported images ({}) in {folder_str}",
                    self.config.supported_extensions.join(", ")
                ),
            );
            return;
        }

        info!("opened {} with {} images", folder_str, self.items.len());
        self.set_feedback(format!("Loaded {} images", self.items.len()));
        self.caption_text = self.items[0].caption.clone();
        self.start_preview_caching();
        self.change_image(ctx);
    }

    fn start_preview_caching(&mut self) {
        let (tx, rx) = mpsc::channel();
        self.preview_receiver = Some(rx);
        self.previews_done = 0;

        let paths: Vec<PathBuf> = self.items.iter().map(|i| i.img_path.clone()).collect();
        let max_size = self.config.preview_size;

        thread::spawn(move || {
            for (idx, path) in paths.iter().enumerate() {
                let message = match decode_preview(path, max_size) {
                    Ok((width, height, pixels)) => PreviewMessage::Decoded {
                        idx,
                        width,
                        height,
                        pixels,
                    },
                    Err(error) => PreviewMessage::Failed { idx, error },
                };
                if tx.send(message).is_err() {
                    return;
                }
            }
        });
    }

    fn drain_preview_messages(&mut self, ctx: &egui::Context) {
        let mut messages = Vec::new();
        let mut finished = false;
        if let Some(rx) = &self.preview_receiver {
            loop {
                match rx.try_recv() {
                    Ok(message) => messages.push(message),
                    Err(mpsc::TryRecvError::Empty) => break,
                    Err(mpsc::TryRecvError::Disconnected) => {
                        finished = true;
                        break;
                    }
                }
            }
        }

        for message in messages {
            self.previews_done += 1;
            match message {
                PreviewMessage::Decoded {
                    idx,
                    width,
                    height,
                    pixels,
                } => {
                    let color_image =
                        egui::ColorImage::from_rgba_unmultiplied([width, height], &pixels);
                    let texture = ctx.load_texture(
                        format!("preview_{idx}"),
                        color_image,
                        egui::TextureOptions::default(),
                    );
                    if idx == self.current_idx && self.current_texture.is_none() {
                        self.current_texture = Some(texture.clone());
                    }
                    self.texture_cache.insert(idx, texture);
                    ctx.request_repaint();
                }
                PreviewMessage::Failed { idx, error } => {
                    warn!("preview {idx} failed: {error}");
                }
            }
        }

        if finished {
            self.preview_receiver = None;
        }
    }

    /// Point the preview at the current image, decoding synchronously when
    /// the background pass has not reached it yet.
    fn change_image(&mut self, ctx: &egui::Context) {
        self.current_texture = None;
        if let Some(texture) = self.texture_cache.get(&self.current_idx) {
            self.current_texture = Some(texture.clone());
            return;
        }
        let Some(item) = self.items.get(self.current_idx) else {
            return;
        };
        match decode_preview(&item.img_path, self.config.preview_size) {
            Ok((width, height, pixels)) => {
                let color_image =
                    egui::ColorImage::from_rgba_unmultiplied([width, height], &pixels);
                let texture = ctx.load_texture(
                    format!("preview_{}", self.current_idx),
                    color_image,
                    egui::TextureOptions::default(),
                );
                self.current_texture = Some(texture.clone());
                self.texture_cache.insert(self.current_idx, texture);
            }
            Err(error) => {
                warn!("{}: preview failed: {error}", item.filename);
            }
        }
    }

    fn next_image(&mut self, ctx: &egui::Context) {
        if self.current_idx + 1 < self.items.len() {
            self.commit_current();
            self.current_idx += 1;
            self.caption_text = self.items[self.current_idx].caption.clone();
            self.change_image(ctx);
        }
    }

    fn previous_image(&mut self, ctx: &egui::Context) {
        if self.current_idx > 0 && !self.items.is_empty() {
            self.commit_current();
            self.current_idx -= 1;
            self.caption_text = self.items[self.current_idx].caption.clone();
            self.change_image(ctx);
        }
    }

    /// Full rescan of the folder's sidecar files, replacing the incremental
    /// counts with ground truth from disk.
    fn rescan_tags(&mut self) {
        let Some(folder) = self.current_folder.clone() else {
            notice("Notice", "Open a folder before rescanning tags.");
            return;
        };

        self.commit_current();
        let sidecars = scan_sidecars(&folder);
        if sidecars.is_empty() {
            self.tag_index.rebuild(&sidecars);
            self.tag_index.save();
            self.sorted_tags = self.tag_index.sorted_tags();
            notice("Notice", "No caption files in this folder.");
            return;
        }

        let summary = self.tag_index.rebuild(&sidecars);
        self.tag_index.save();
        self.sorted_tags = self.tag_index.sorted_tags();
        self.set_feedback(format!("{} distinct tags", summary.distinct));
        notice(
            "Rescan complete",
            &format!(
                "Processed {}/{} caption files\n{} distinct tags",
                summary.processed, summary.total, summary.distinct
            ),
        );
    }

    fn commit_for_shutdown(&mut self) {
        if self.shutdown_committed {
            return;
        }
        self.shutdown_committed = true;
        self.commit_current();
        self.tag_index.save();
        info!("final state saved");
    }

    fn top_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label("Folder:");
                ui.add(
                    egui::TextEdit::singleline(&mut self.folder_input).desired_width(420.0),
                );

                let entries = self.history_entries.clone();
                egui::ComboBox::from_id_salt("folder_history")
                    .selected_text("Recent")
                    .width(80.0)
                    .show_ui(ui, |ui| {
                        for entry in &entries {
                            if ui.selectable_label(false, entry).clicked() {
                                self.folder_input = entry.clone();
                            }
                        }
                    });

                if ui.button("Browse…").clicked() {
                    if let Some(path) = FileDialog::new().pick_folder() {
                        self.folder_input = path.to_string_lossy().into_owned();
                    }
                }
                if ui.button("Open folder").clicked() {
                    self.open_folder(ctx);
                }
            });

            let expired = self
                .feedback
                .as_ref()
                .is_some_and(|(_, since)| since.elapsed().as_secs() >= FEEDBACK_SECS);
            if expired {
                self.feedback = None;
            }
            if let Some((message, _)) = &self.feedback {
                ui.colored_label(egui::Color32::GREEN, message);
            }

            if self.preview_receiver.is_some() && !self.items.is_empty() {
                ui.add_space(4.0);
                ui.add(
                    egui::ProgressBar::new(self.previews_done as f32 / self.items.len() as f32)
                        .show_percentage()
                        .desired_width(ui.available_width()),
                );
            }
        });
    }

    fn tag_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("tag_panel")
            .resizable(false)
            .min_width(260.0)
            .default_width(260.0)
            .show(ctx, |ui| {
                ui.heading("Frequent tags");
                ui.label("Click a row to insert it into the caption.");
                ui.add_space(4.0);
                if ui.button("Refresh tags").clicked() {
                    self.rescan_tags();
                }
                ui.separator();

                let mut clicked_tag = None;
                egui::ScrollArea::vertical()
                    .id_salt("tag_table")
                    .show(ui, |ui| {
                        for (count, tag) in &self.sorted_tags {
                            if ui
                                .selectable_label(false, format!("{count:>4}  {tag}"))
                                .clicked()
                            {
                                clicked_tag = Some(tag.clone());
                            }
                        }
                    });

                if let Some(tag) = clicked_tag {
                    self.caption_text = self.tag_index.insert_tag(&self.caption_text, &tag);
                }
            });
    }

    fn caption_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("caption_panel").show(ctx, |ui| {
            ui.add_space(4.0);
            if let Some(item) = self.items.get(self.current_idx) {
                ui.label(item.info());
            } else {
                ui.label("No folder/image selected");
            }

            ui.add(
                egui::TextEdit::multiline(&mut self.caption_text)
                    .desired_rows(5)
                    .desired_width(f32::INFINITY),
            );

            ui.horizontal(|ui| {
                let at_start = self.current_idx == 0;
                let at_end =
                    self.items.is_empty() || self.current_idx + 1 == self.items.len();

                if ui.add_enabled(!at_start, egui::Button::new("Previous")).clicked() {
                    self.previous_image(ctx);
                }
                if ui.add_enabled(!at_end, egui::Button::new("Next")).clicked() {
                    self.next_image(ctx);
                }
                ui.label("PageUp/PageDown to navigate");

                if self.items.is_empty() {
                    ui.label("Progress: 0/0");
                } else {
                    ui.label(format!(
                        "Progress: {}/{}",
                        self.current_idx + 1,
                        self.items.len()
                    ));
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Exit").clicked() {
                        self.commit_for_shutdown();
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
            });
            ui.add_space(4.0);
        });
    }

    fn image_panel(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            if let Some(texture) = &self.current_texture {
                let available = ui.available_size();
                let aspect = texture.aspect_ratio();
                let mut size = available;
                if (size.x / size.y) > aspect {
                    size.x = size.y * aspect;
                } else {
                    size.y = size.x / aspect;
                }
                ui.centered_and_justified(|ui| {
                    ui.add(egui::Image::new(texture).max_size(size));
                });
            } else {
                ui.centered_and_justified(|ui| {
                    ui.label("No image loaded. Open a folder to start tagging.");
                });
            }
        });
    }
}

impl eframe::App for TaggerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_preview_messages(ctx);

        if ctx.input(|i| i.viewport().close_requested()) {
            self.commit_for_shutdown();
        }
        if ctx.input(|i| i.key_pressed(egui::Key::PageUp)) {
            self.previous_image(ctx);
        }
        if ctx.input(|i| i.key_pressed(egui::Key::PageDown)) {
            self.next_image(ctx);
        }

        self.top_panel(ctx);
        self.tag_panel(ctx);
        self.caption_panel(ctx);
        self.image_panel(ctx);
    }
}

fn notice(title: &str, description: &str) {
    rfd::MessageDialog::new()
        .set_title(title)
        .set_description(description)
        .show();
}

/// Supported images directly inside `folder` (no subdirectories), in lexical
/// path order.
fn scan_images(folder: &Path, config: &AppConfig) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| config.is_supported_image(path))
        .collect();
    paths.sort();
    paths
}

/// Sidecar caption files directly inside `folder`, in lexical path order.
fn scan_sidecars(folder: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("txt"))
        })
        .collect();
    paths.sort();
    paths
}

fn decode_preview(path: &Path, max_size: u32) -> Result<(usize, usize, Vec<u8>), String> {
    let img = image::ImageReader::open(path)
        .map_err(|err| format!("open error: {err}"))?
        .decode()
        .map_err(|err| format!("decode error: {err}"))?;
    let resized = img.resize(max_size, max_size, image::imageops::FilterType::Triangle);
    let (width, height) = (resized.width() as usize, resized.height() as usize);
    Ok((width, height, resized.to_rgba8().into_raw()))
}
