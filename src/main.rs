#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod app;
mod caption;
mod config;
mod error;
mod folder_history;
mod normalize;
mod tag_index;

use eframe::egui;

use crate::app::TaggerApp;
use crate::config::AppConfig;

fn main() -> Result<(), eframe::Error> {
    env_logger::init();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1280.0, 800.0]),
        ..Default::default()
    };

    eframe::run_native(
        "LoRA Image Tagger",
        native_options,
        Box::new(|cc| Ok(Box::new(TaggerApp::new(cc, AppConfig::default())))),
    )
}
