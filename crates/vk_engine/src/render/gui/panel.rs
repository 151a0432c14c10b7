//! Debug panel contents and window input translation
//!
//! The overlay runs egui at one point per framebuffer pixel, so cursor
//! positions arrive already in points.

use ash::vk;
use egui::{pos2, vec2, Event, Modifiers, Pos2, RawInput, Rect};

use crate::render::overlay::{FrameStats, OverlayInput, PointerButton, RendererControls};

/// Collects window input between egui frames
#[derive(Debug, Default)]
pub struct InputCollector {
    pointer: Option<Pos2>,
    events: Vec<Event>,
}

impl InputCollector {
    /// Translate one window event
    ///
    /// Button events before the first cursor position are dropped since
    /// egui needs a position for them.
    pub fn push(&mut self, input: &OverlayInput) {
        match *input {
            OverlayInput::CursorMoved { x, y } => {
                let position = pos2(x, y);
                self.pointer = Some(position);
                self.events.push(Event::PointerMoved(position));
            }
            OverlayInput::CursorLeft => {
                self.pointer = None;
                self.events.push(Event::PointerGone);
            }
            OverlayInput::Button { button, pressed } => {
                if let Some(pos) = self.pointer {
                    self.events.push(Event::PointerButton {
                        pos,
                        button: egui_button(button),
                        pressed,
                        modifiers: Modifiers::default(),
                    });
                }
            }
        }
    }

    /// Last known cursor position
    pub fn pointer(&self) -> Option<Pos2> {
        self.pointer
    }

    /// Input for the next egui frame, draining queued events
    #[allow(clippy::cast_precision_loss)]
    pub fn take_raw_input(&mut self, extent: vk::Extent2D, time: f64) -> RawInput {
        RawInput {
            screen_rect: Some(Rect::from_min_size(
                Pos2::ZERO,
                vec2(extent.width as f32, extent.height as f32),
            )),
            time: Some(time),
            events: std::mem::take(&mut self.events),
            ..RawInput::default()
        }
    }
}

fn egui_button(button: PointerButton) -> egui::PointerButton {
    match button {
        PointerButton::Primary => egui::PointerButton::Primary,
        PointerButton::Secondary => egui::PointerButton::Secondary,
        PointerButton::Middle => egui::PointerButton::Middle,
    }
}

/// Window showing frame timing with the clear color editor and an exit button
#[derive(Debug, Clone)]
pub struct DebugPanel {
    title: String,
}

impl Default for DebugPanel {
    fn default() -> Self {
        Self::new("Renderer")
    }
}

impl DebugPanel {
    /// Panel with window title `title`
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into() }
    }

    /// Lay out the panel for one frame
    pub fn show(&self, ctx: &egui::Context, stats: &FrameStats, controls: &mut RendererControls) {
        egui::Window::new(self.title.as_str())
            .default_pos(pos2(12.0, 12.0))
            .resizable(false)
            .show(ctx, |ui| {
                ui.label(format!(
                    "{:.3} ms/frame ({:.1} FPS)",
                    stats.average_frame_time_ms, stats.fps
                ));
                ui.label(format!("frame {}", stats.frame_count));

                ui.horizontal(|ui| {
                    let [r, g, b, a] = controls.clear_color;
                    let mut rgb = [r, g, b];
                    if ui.color_edit_button_rgb(&mut rgb).changed() {
                        controls.clear_color = [rgb[0], rgb[1], rgb[2], a];
                    }
                    ui.label("clear color");
                });

                if ui.button("Exit").clicked() {
                    controls.quit_requested = true;
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXTENT: vk::Extent2D = vk::Extent2D { width: 640, height: 480 };

    #[test]
    fn test_button_before_cursor_dropped() {
        let mut input = InputCollector::default();
        input.push(&OverlayInput::Button {
            button: PointerButton::Primary,
            pressed: true,
        });
        assert!(input.take_raw_input(EXTENT, 0.0).events.is_empty());
    }

    #[test]
    fn test_click_uses_last_cursor_position() {
        let mut input = InputCollector::default();
        input.push(&OverlayInput::CursorMoved { x: 30.0, y: 40.0 });
        input.push(&OverlayInput::Button {
            button: PointerButton::Secondary,
            pressed: false,
        });

        let raw = input.take_raw_input(EXTENT, 1.5);
        assert_eq!(raw.events.len(), 2);
        assert!(matches!(
            raw.events[1],
            Event::PointerButton {
                pos,
                button: egui::PointerButton::Secondary,
                pressed: false,
                ..
            } if pos == pos2(30.0, 40.0)
        ));
        assert_eq!(raw.time, Some(1.5));
        assert_eq!(raw.screen_rect.map(|rect| rect.size()), Some(vec2(640.0, 480.0)));
    }

    #[test]
    fn test_cursor_leaving_forgets_position() {
        let mut input = InputCollector::default();
        input.push(&OverlayInput::CursorMoved { x: 1.0, y: 2.0 });
        input.push(&OverlayInput::CursorLeft);

        assert_eq!(input.pointer(), None);
        let raw = input.take_raw_input(EXTENT, 0.0);
        assert!(matches!(raw.events.last(), Some(Event::PointerGone)));
        assert!(input.take_raw_input(EXTENT, 0.0).events.is_empty());
    }

    #[test]
    fn test_panel_draws_without_touching_controls() {
        let ctx = egui::Context::default();
        let mut input = InputCollector::default();
        let stats = FrameStats {
            frame_count: 120,
            average_frame_time_ms: 16.6,
            fps: 60.2,
        };
        let mut controls = RendererControls::new([0.45, 0.55, 0.6, 1.0]);

        let output = ctx.run(input.take_raw_input(EXTENT, 0.0), |ctx| {
            DebugPanel::default().show(ctx, &stats, &mut controls);
        });
        let primitives = ctx.tessellate(output.shapes, output.pixels_per_point);

        assert!(!primitives.is_empty());
        assert!(!output.textures_delta.set.is_empty());
        assert_eq!(controls, RendererControls::new([0.45, 0.55, 0.6, 1.0]));
    }
}
