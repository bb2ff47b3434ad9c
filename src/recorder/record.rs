use serde::{Deserialize, Serialize};

/// The kind of action a record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    MouseClick,
    MouseScroll,
    KeyPress,
}

/// A point on screen together with the screen extent it was measured against
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPosition {
    pub x: f64,
    pub y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl ScreenPosition {
    /// Position as a percentage of the screen extent on each axis
    pub fn percent(&self) -> (f64, f64) {
        let px = if self.max_x > 0.0 {
            self.x / self.max_x * 100.0
        } else {
            0.0
        };
        let py = if self.max_y > 0.0 {
            self.y / self.max_y * 100.0
        } else {
            0.0
        };
        (px, py)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollDelta {
    pub dx: i64,
    pub dy: i64,
}

/// Action-specific payload; fields that do not apply serialize as `null`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionContent {
    pub position: Option<ScreenPosition>,
    pub button: Option<String>,
    pub delta: Option<ScrollDelta>,
    pub key: Option<String>,
}

/// One persisted user action. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Epoch seconds
    pub timestamp: f64,
    pub action_type: ActionType,
    pub action_content: ActionContent,
    pub active_app: String,
    /// Path of the plain screenshot relative to the save root
    pub screenshot_path: String,
    pub mouse_position: ScreenPosition,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_json_shape() {
        let record = ActionRecord {
            timestamp: 1_700_000_000.25,
            action_type: ActionType::MouseScroll,
            action_content: ActionContent {
                position: Some(ScreenPosition {
                    x: 10.0,
                    y: 20.0,
                    max_x: 1920.0,
                    max_y: 1080.0,
                }),
                delta: Some(ScrollDelta { dx: 0, dy: -3 }),
                ..Default::default()
            },
            active_app: "Safari".to_string(),
            screenshot_path: "records/s/screenshots/original/a.jpg".to_string(),
            mouse_position: ScreenPosition {
                x: 10.0,
                y: 20.0,
                max_x: 1920.0,
                max_y: 1080.0,
            },
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["action_type"], "mouse_scroll");
        assert_eq!(value["action_content"]["delta"]["dy"], -3);
        assert!(value["action_content"]["button"].is_null());
        assert!(value["action_content"]["key"].is_null());
        assert_eq!(value["mouse_position"]["max_x"], 1920.0);
    }

    #[test]
    fn test_percent_handles_zero_extent() {
        let pos = ScreenPosition {
            x: 50.0,
            y: 50.0,
            max_x: 0.0,
            max_y: 200.0,
        };
        assert_eq!(pos.percent(), (0.0, 25.0));
    }
}
