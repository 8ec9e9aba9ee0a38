use serenity::{
    all::ButtonStyle,
    builder::{CreateActionRow, CreateButton},
};

use crate::audio::window::{WindowAction, WindowView};

/// Constructor de controles de la ventana
pub struct MusicControls;

impl MusicControls {
    /// Fila de botones de la ventana; deshabilitada si no hay canción
    pub fn create_player_controls(view: &WindowView) -> Vec<CreateActionRow> {
        let idle = matches!(view, WindowView::Empty);

        let buttons = WindowAction::ALL
            .into_iter()
            .map(|action| {
                CreateButton::new(action.custom_id())
                    .emoji(Self::emoji(action))
                    .style(Self::style(action))
                    .disabled(idle && action != WindowAction::Shuffle)
            })
            .collect();

        vec![CreateActionRow::Buttons(buttons)]
    }

    fn emoji(action: WindowAction) -> char {
        match action {
            WindowAction::PlayPause => '⏯',
            WindowAction::Skip => '⏭',
            WindowAction::Stop => '⏹',
            WindowAction::Shuffle => '🔀',
            WindowAction::Loop => '🔁',
        }
    }

    fn style(action: WindowAction) -> ButtonStyle {
        match action {
            WindowAction::PlayPause => ButtonStyle::Primary,
            WindowAction::Stop => ButtonStyle::Danger,
            _ => ButtonStyle::Secondary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn one_button_per_action_in_order() {
        let rows = MusicControls::create_player_controls(&WindowView::Empty);
        let json = serde_json::to_value(&rows).unwrap();
        let ids: Vec<&str> = json[0]["components"]
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["custom_id"].as_str().unwrap())
            .collect();

        assert_eq!(
            ids,
            vec![
                "music_play_pause",
                "music_skip",
                "music_stop",
                "music_shuffle",
                "music_loop"
            ]
        );
    }
}
