//! Which controls are on screen in drawing and camera mode.

use std::collections::BTreeSet;

/// Screen mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Drawing,
    Camera,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Control {
    Canvas,
    Video,
    CameraButton,
    NewDrawingButton,
    TakePictureButton,
    ColorPicker,
    SaveButton,
}

/// Visibility of every control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiState {
    mode: Mode,
    visible: BTreeSet<Control>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            mode: Mode::Drawing,
            visible: [
                Control::Canvas,
                Control::CameraButton,
                Control::NewDrawingButton,
                Control::ColorPicker,
                Control::SaveButton,
            ]
            .into_iter()
            .collect(),
        }
    }
}

impl UiState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_visible(&self, control: Control) -> bool {
        self.visible.contains(&control)
    }

    fn show(&mut self, controls: &[Control]) {
        self.visible.extend(controls.iter().copied());
    }

    fn hide(&mut self, controls: &[Control]) {
        for control in controls {
            self.visible.remove(control);
        }
    }

    /// "New drawing": back to the canvas. Picker and save keep their visibility.
    pub fn new_drawing(&mut self) {
        self.mode = Mode::Drawing;
        self.show(&[Control::Canvas, Control::CameraButton]);
        self.hide(&[Control::Video, Control::TakePictureButton]);
    }

    /// Camera stream acquired. Call only after the stream opened.
    pub fn open_camera(&mut self) {
        self.mode = Mode::Camera;
        self.show(&[Control::Video, Control::TakePictureButton]);
        self.hide(&[
            Control::Canvas,
            Control::CameraButton,
            Control::NewDrawingButton,
            Control::ColorPicker,
            Control::SaveButton,
        ]);
    }

    /// Frame captured; restore the full drawing toolbar.
    pub fn take_picture(&mut self) {
        self.mode = Mode::Drawing;
        self.hide(&[Control::Video, Control::TakePictureButton]);
        self.show(&[
            Control::Canvas,
            Control::CameraButton,
            Control::NewDrawingButton,
            Control::ColorPicker,
            Control::SaveButton,
        ]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_round_trip() {
        let mut ui = UiState::new();
        assert!(ui.is_visible(Control::SaveButton));
        assert!(!ui.is_visible(Control::TakePictureButton));

        ui.open_camera();
        assert_eq!(ui.mode(), Mode::Camera);
        assert!(ui.is_visible(Control::Video));
        assert!(!ui.is_visible(Control::SaveButton));
        assert!(!ui.is_visible(Control::ColorPicker));

        ui.take_picture();
        assert_eq!(ui, UiState::new());
    }

    #[test]
    fn test_new_drawing_leaves_toolbar_alone() {
        let mut ui = UiState::new();
        ui.open_camera();
        ui.new_drawing();

        assert_eq!(ui.mode(), Mode::Drawing);
        assert!(ui.is_visible(Control::Canvas));
        assert!(!ui.is_visible(Control::Video));
        assert!(!ui.is_visible(Control::SaveButton));
    }
}
