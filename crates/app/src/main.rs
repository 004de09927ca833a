mod config;

use config::Config;
use eframe::egui;
use spectra_core::{RenderOptions, Session, StftConfig, WindowKind};
use spectra_engine::PlaybackHandle;

fn main() -> eframe::Result<()> {
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1080.0, 760.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Spectra",
        options,
        Box::new(|_cc| Ok(Box::new(SpectraApp::new()))),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NoticeKind {
    Info,
    Warning,
    Error,
}

struct Notice {
    kind: NoticeKind,
    message: String,
}

struct SpectraApp {
    session: Session,
    engine: Option<PlaybackHandle>,
    config: Config,
    render_options: RenderOptions,
    notice: Option<Notice>,
    texture: Option<egui::TextureHandle>,
}

impl SpectraApp {
    fn new() -> Self {
        let config = Config::load();
        let session = Session::new(config.stft);

        Self {
            session,
            engine: None,
            config,
            render_options: RenderOptions::default(),
            notice: None,
            texture: None,
        }
    }

    fn notify(&mut self, kind: NoticeKind, message: impl Into<String>) {
        let message = message.into();
        match kind {
            NoticeKind::Info => log::info!("{message}"),
            NoticeKind::Warning => log::warn!("{message}"),
            NoticeKind::Error => log::error!("{message}"),
        }
        self.notice = Some(Notice { kind, message });
    }

    fn open_file(&mut self) {
        let mut dialog = rfd::FileDialog::new().add_filter("Audio files", &["wav", "mp3"]);
        if let Some(dir) = &self.config.last_open_dir {
            dialog = dialog.set_directory(dir);
        }

        let Some(path) = dialog.pick_file() else {
            return;
        };

        if let Some(parent) = path.parent() {
            self.config.last_open_dir = Some(parent.to_path_buf());
            self.config.save();
        }

        match self.session.load(&path) {
            Ok(()) => {
                self.texture = None;
                self.notify(
                    NoticeKind::Info,
                    format!("Loaded and analyzed '{}'.", path.display()),
                );
            }
            Err(e) => {
                self.notify(NoticeKind::Error, format!("Failed to load file: {e}"));
            }
        }
    }

    fn view_spectrogram(&mut self, ctx: &egui::Context) {
        if self.session.is_empty() {
            self.notify(
                NoticeKind::Warning,
                "No spectrogram to show. Load an audio file first.",
            );
            return;
        }

        match self.session.render_current(&self.render_options) {
            Ok(image) => {
                let size = [image.width() as usize, image.height() as usize];
                let color_image = egui::ColorImage::from_rgb(size, image.pixels());
                self.texture =
                    Some(ctx.load_texture("spectrogram", color_image, egui::TextureOptions::LINEAR));
            }
            Err(e) => {
                self.notify(NoticeKind::Error, format!("Failed to render spectrogram: {e}"));
            }
        }
    }

    fn save_spectrogram(&mut self) {
        if self.session.is_empty() {
            self.notify(
                NoticeKind::Warning,
                "No spectrogram to save. Load an audio file first.",
            );
            return;
        }

        let default_name = self
            .session
            .current_audio_path()
            .and_then(|p| p.file_stem())
            .map(|s| format!("{}_spectrogram.png", s.to_string_lossy()))
            .unwrap_or_else(|| "spectrogram.png".to_string());

        let mut dialog = rfd::FileDialog::new()
            .add_filter("PNG image", &["png"])
            .add_filter("JPEG image", &["jpg", "jpeg"])
            .set_file_name(&default_name);
        if let Some(dir) = &self.config.last_save_dir {
            dialog = dialog.set_directory(dir);
        }

        let Some(path) = dialog.save_file() else {
            return;
        };

        if let Some(parent) = path.parent() {
            self.config.last_save_dir = Some(parent.to_path_buf());
            self.config.save();
        }

        let result = self
            .session
            .render_current(&self.render_options)
            .and_then(|image| Ok(spectra_core::export(&image, &path)?));

        match result {
            Ok(()) => {
                self.notify(
                    NoticeKind::Info,
                    format!("Spectrogram saved to '{}'.", path.display()),
                );
            }
            Err(e) => {
                self.notify(NoticeKind::Error, format!("Failed to save spectrogram: {e}"));
            }
        }
    }

    fn play_audio(&mut self) {
        let Some(audio) = self.session.current_audio().cloned() else {
            self.notify(NoticeKind::Warning, "No audio loaded to play.");
            return;
        };

        if self.engine.is_none() {
            match spectra_engine::start() {
                Ok(handle) => self.engine = Some(handle),
                Err(e) => {
                    self.notify(
                        NoticeKind::Error,
                        format!("Failed to start playback engine: {e}"),
                    );
                    return;
                }
            }
        }

        let Some(engine) = &mut self.engine else {
            return;
        };
        match engine.play(&audio) {
            Ok(()) => self.notify(NoticeKind::Info, "Playback started."),
            Err(e) => self.notify(NoticeKind::Error, format!("Playback failed: {e}")),
        }
    }

    fn stop_audio(&mut self) {
        let Some(engine) = &mut self.engine else {
            return;
        };
        match engine.stop() {
            Ok(()) => self.notify(NoticeKind::Info, "Playback stopped."),
            Err(e) => self.notify(NoticeKind::Error, format!("Failed to stop playback: {e}")),
        }
    }

    fn settings_ui(&mut self, ui: &mut egui::Ui) {
        let mut stft = *self.session.config();
        let mut changed = false;

        ui.horizontal(|ui| {
            ui.label("Window:");
            egui::ComboBox::from_id_salt("window_size")
                .selected_text(format!("{}", stft.window_size))
                .show_ui(ui, |ui| {
                    for size in [512usize, 1024, 2048, 4096] {
                        if ui
                            .selectable_label(stft.window_size == size, format!("{size}"))
                            .clicked()
                        {
                            stft.window_size = size;
                            changed = true;
                        }
                    }
                });

            ui.label("Hop:");
            egui::ComboBox::from_id_salt("hop_size")
                .selected_text(format!("{}", stft.hop_size))
                .show_ui(ui, |ui| {
                    for hop in [128usize, 256, 512, 1024] {
                        if ui
                            .selectable_label(stft.hop_size == hop, format!("{hop}"))
                            .clicked()
                        {
                            stft.hop_size = hop;
                            changed = true;
                        }
                    }
                });

            ui.label("Window function:");
            egui::ComboBox::from_id_salt("window_fn")
                .selected_text(format!("{:?}", stft.window))
                .show_ui(ui, |ui| {
                    for kind in [WindowKind::Hann, WindowKind::Hamming, WindowKind::Rectangular] {
                        if ui
                            .selectable_label(stft.window == kind, format!("{kind:?}"))
                            .clicked()
                        {
                            stft.window = kind;
                            changed = true;
                        }
                    }
                });
        });

        if changed {
            self.apply_stft_config(stft);
        }
    }

    fn apply_stft_config(&mut self, stft: StftConfig) {
        self.session.set_config(stft);
        self.config.stft = stft;
        self.config.save();
        self.notify(
            NoticeKind::Info,
            "Analysis settings updated. They apply to the next loaded file.",
        );
    }

    fn current_file_label(&self) -> String {
        match self.session.current_audio_path() {
            Some(path) => format!("File: {}", path.display()),
            None => "No file loaded".to_string(),
        }
    }
}

impl eframe::App for SpectraApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Audio Spectrum Analyzer");

            if let Some(notice) = &self.notice {
                let color = match notice.kind {
                    NoticeKind::Info => egui::Color32::LIGHT_GREEN,
                    NoticeKind::Warning => egui::Color32::YELLOW,
                    NoticeKind::Error => egui::Color32::RED,
                };
                ui.colored_label(color, &notice.message);
            }

            ui.label(self.current_file_label());
            ui.separator();

            ui.horizontal(|ui| {
                if ui.button("Open audio file…").clicked() {
                    self.open_file();
                }
                if ui.button("View spectrogram").clicked() {
                    self.view_spectrogram(ctx);
                }
                if ui.button("Save spectrogram…").clicked() {
                    self.save_spectrogram();
                }
                if ui.button("▶ Play").clicked() {
                    self.play_audio();
                }
                if ui.button("⏹ Stop").clicked() {
                    self.stop_audio();
                }
            });

            self.settings_ui(ui);
            ui.separator();

            egui::ScrollArea::both().show(ui, |ui| {
                if let Some(texture) = &self.texture {
                    ui.image((texture.id(), texture.size_vec2()));
                } else {
                    ui.weak("Open a file and press 'View spectrogram'.");
                }
            });
        });
    }
}
