use crossterm::{
    cursor::MoveTo,
    event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    queue,
    style::{Attribute, Print, SetAttribute},
    terminal::{self, Clear, ClearType},
};
use std::io::Write;

use crate::manager::{ResolvedSensors, SubscriptionState};
use crate::sensor::{SensorDescriptor, TrackedKind};
use crate::store::StoreSnapshot;

pub const TITLE: &str = "Sensor demo";

/// Line shown when the device has no sensor of `kind`
pub fn unavailable_message(kind: TrackedKind) -> &'static str {
    match kind {
        TrackedKind::Light => "Light sensor not available",
        TrackedKind::Accelerometer => "Acceleration sensor not available",
        TrackedKind::Gyroscope => "Gyroscope sensor not available",
    }
}

/// Everything one render pass reads
#[derive(Debug, Clone, Copy)]
pub struct ViewModel<'a> {
    pub resolved: &'a ResolvedSensors,
    pub snapshot: &'a StoreSnapshot,
    pub inventory: &'a [SensorDescriptor],
}

impl<'a> ViewModel<'a> {
    /// Availability comes from the resolved descriptor, never from store contents
    pub fn reading_line(&self, kind: TrackedKind) -> &'a str {
        if self.resolved.get(kind).is_some() {
            self.snapshot.display(kind)
        } else {
            unavailable_message(kind)
        }
    }

    pub fn header_lines(&self) -> Vec<String> {
        let mut lines = vec![TITLE.to_string(), String::new()];
        lines.extend(TrackedKind::ALL.iter().map(|&k| self.reading_line(k).to_string()));
        lines
    }

    pub fn inventory_lines(&self) -> Vec<String> {
        inventory_lines(self.inventory)
    }
}

pub fn inventory_lines(inventory: &[SensorDescriptor]) -> Vec<String> {
    inventory
        .iter()
        .flat_map(|sensor| {
            [
                format!("Name of sensor : {}", sensor.name),
                format!("Type of sensor : {}", sensor.type_code),
                format!("Manufacturer : {}", sensor.vendor),
                String::new(),
            ]
        })
        .collect()
}

/// Full screen contents, header first, then a blank line and the inventory
pub fn render_lines(model: &ViewModel<'_>) -> Vec<String> {
    let mut lines = model.header_lines();
    lines.push(String::new());
    lines.extend(model.inventory_lines());
    lines
}

/// What an input event asks the demo to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    TogglePause,
    /// Terminal regained focus: the view is visible again
    Foreground,
    /// Terminal lost focus: the view is hidden
    Background,
    ScrollLines(isize),
    ScrollPages(isize),
    ScrollHome,
    Redraw,
}

pub fn action_for(event: &Event) -> Option<Action> {
    match event {
        Event::FocusGained => Some(Action::Foreground),
        Event::FocusLost => Some(Action::Background),
        Event::Resize(_, _) => Some(Action::Redraw),
        Event::Key(key) => key_action(key),
        _ => None,
    }
}

fn key_action(key: &KeyEvent) -> Option<Action> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::Quit),
        KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
        KeyCode::Char('p') | KeyCode::Char(' ') => Some(Action::TogglePause),
        KeyCode::Up | KeyCode::Char('k') => Some(Action::ScrollLines(-1)),
        KeyCode::Down | KeyCode::Char('j') => Some(Action::ScrollLines(1)),
        KeyCode::PageUp => Some(Action::ScrollPages(-1)),
        KeyCode::PageDown => Some(Action::ScrollPages(1)),
        KeyCode::Home => Some(Action::ScrollHome),
        _ => None,
    }
}

/// Crossterm renderer with a scrollable inventory below a fixed header
#[derive(Debug, Default)]
pub struct TerminalView {
    scroll: usize,
    last_inventory_len: usize,
    last_body_height: usize,
}

impl TerminalView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll
    }

    fn max_scroll(&self) -> usize {
        self.last_inventory_len.saturating_sub(self.last_body_height)
    }

    pub fn scroll_by(&mut self, delta: isize) {
        let target = if delta < 0 {
            self.scroll.saturating_sub(delta.unsigned_abs())
        } else {
            self.scroll.saturating_add(delta as usize)
        };
        self.scroll = target.min(self.max_scroll());
    }

    pub fn scroll_pages(&mut self, pages: isize) {
        let page = self.last_body_height.max(1) as isize;
        self.scroll_by(pages * page);
    }

    pub fn scroll_home(&mut self) {
        self.scroll = 0;
    }

    pub fn draw<W: Write>(
        &mut self,
        out: &mut W,
        model: &ViewModel<'_>,
        state: SubscriptionState,
    ) -> std::io::Result<()> {
        let (_, rows) = terminal::size()?;
        let rows = rows as usize;

        let header = model.header_lines();
        let body = model.inventory_lines();
        let status = match state {
            SubscriptionState::Active => "[live]   p: pause   arrows: scroll   q: quit",
            SubscriptionState::Inactive => "[paused] p: resume  arrows: scroll   q: quit",
        };

        // header + blank + body + status line
        let body_height = rows.saturating_sub(header.len() + 2);
        self.last_inventory_len = body.len();
        self.last_body_height = body_height;
        self.scroll = self.scroll.min(self.max_scroll());

        queue!(out, Clear(ClearType::All), MoveTo(0, 0))?;
        let mut row = 0u16;
        for (i, line) in header.iter().enumerate() {
            queue!(out, MoveTo(0, row))?;
            if i == 0 {
                queue!(out, SetAttribute(Attribute::Bold), Print(line), SetAttribute(Attribute::Reset))?;
            } else {
                queue!(out, Print(line))?;
            }
            row += 1;
        }
        row += 1;

        for line in body.iter().skip(self.scroll).take(body_height) {
            queue!(out, MoveTo(0, row), Print(line))?;
            row += 1;
        }

        if rows > 0 {
            queue!(
                out,
                MoveTo(0, (rows - 1) as u16),
                SetAttribute(Attribute::Dim),
                Print(status),
                SetAttribute(Attribute::Reset)
            )?;
        }
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::SubscriptionManager;
    use crate::sensor::Cadence;
    use crate::source::PushSource;
    use crate::store::LatestReadingStore;

    fn manager_with(sensors: Vec<SensorDescriptor>) -> SubscriptionManager<PushSource> {
        SubscriptionManager::new(
            PushSource::with_sensors(sensors),
            LatestReadingStore::new(),
            Cadence::Normal,
        )
    }

    #[test]
    fn test_render_branches_on_availability() {
        let manager = manager_with(vec![SensorDescriptor::new("a", "Accel", 1, "V")]);
        // Store content for an absent kind must not leak into the view
        manager.store().update(TrackedKind::Light, &[99.0]).unwrap();
        manager
            .store()
            .update(TrackedKind::Accelerometer, &[1.0, 2.0, 3.0])
            .unwrap();

        let snapshot = manager.store().snapshot();
        let model = ViewModel {
            resolved: manager.resolved(),
            snapshot: &snapshot,
            inventory: manager.inventory(),
        };

        assert_eq!(
            model.header_lines(),
            vec![
                "Sensor demo",
                "",
                "Light sensor not available",
                "Accelerometer: X=1.0, Y=2.0, Z=3.0",
                "Gyroscope sensor not available",
            ]
        );
    }

    #[test]
    fn test_available_kind_shows_placeholder_before_first_reading() {
        let manager = manager_with(vec![SensorDescriptor::new("g", "Gyro", 4, "V")]);
        let snapshot = manager.store().snapshot();
        let model = ViewModel {
            resolved: manager.resolved(),
            snapshot: &snapshot,
            inventory: manager.inventory(),
        };
        assert_eq!(
            model.reading_line(TrackedKind::Gyroscope),
            "Sensor gyroscope not available"
        );
    }

    #[test]
    fn test_inventory_listing() {
        let sensors = vec![
            SensorDescriptor::new("1", "A", 1, "X"),
            SensorDescriptor::new("2", "B", 5, "Y"),
        ];
        assert_eq!(
            inventory_lines(&sensors),
            vec![
                "Name of sensor : A",
                "Type of sensor : 1",
                "Manufacturer : X",
                "",
                "Name of sensor : B",
                "Type of sensor : 5",
                "Manufacturer : Y",
                "",
            ]
        );
    }

    #[test]
    fn test_render_lines_layout() {
        let manager = manager_with(vec![SensorDescriptor::new("9", "Baro", 6, "Z")]);
        let snapshot = manager.store().snapshot();
        let model = ViewModel {
            resolved: manager.resolved(),
            snapshot: &snapshot,
            inventory: manager.inventory(),
        };
        let lines = render_lines(&model);
        assert_eq!(lines.len(), 5 + 1 + 4);
        assert_eq!(lines[6], "Name of sensor : Baro");
    }

    #[test]
    fn test_scroll_clamped() {
        let mut view = TerminalView::new();
        view.last_inventory_len = 20;
        view.last_body_height = 8;

        view.scroll_by(-3);
        assert_eq!(view.scroll_offset(), 0);
        view.scroll_by(5);
        assert_eq!(view.scroll_offset(), 5);
        view.scroll_by(100);
        assert_eq!(view.scroll_offset(), 12);
        view.scroll_home();
        assert_eq!(view.scroll_offset(), 0);
        view.scroll_pages(1);
        assert_eq!(view.scroll_offset(), 8);
    }

    #[test]
    fn test_action_mapping() {
        let key = |code, modifiers| Event::Key(KeyEvent::new(code, modifiers));

        assert_eq!(action_for(&key(KeyCode::Char('q'), KeyModifiers::NONE)), Some(Action::Quit));
        assert_eq!(
            action_for(&key(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Action::Quit)
        );
        assert_eq!(action_for(&key(KeyCode::Char('c'), KeyModifiers::NONE)), None);
        assert_eq!(
            action_for(&key(KeyCode::Char('p'), KeyModifiers::NONE)),
            Some(Action::TogglePause)
        );
        assert_eq!(
            action_for(&key(KeyCode::PageDown, KeyModifiers::NONE)),
            Some(Action::ScrollPages(1))
        );
        assert_eq!(action_for(&Event::FocusLost), Some(Action::Background));
        assert_eq!(action_for(&Event::FocusGained), Some(Action::Foreground));
    }
}
