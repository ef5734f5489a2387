use serenity::{
    all::ButtonStyle,
    builder::{CreateActionRow, CreateButton},
};

/// IDs personalizados para los botones
pub mod button_ids {
    pub const PAUSE: &str = "music_pause";
    pub const SKIP: &str = "music_skip";
    pub const STOP: &str = "music_stop";
}

/// Controles del mensaje de `/nowplaying`. El primer botón alterna pausa.
pub fn create_player_buttons(is_playing: bool) -> Vec<CreateActionRow> {
    let (label, emoji) = if is_playing {
        ("Pause", '⏸')
    } else {
        ("Resume", '▶')
    };

    let pause_btn = CreateButton::new(button_ids::PAUSE)
        .label(label)
        .emoji(emoji)
        .style(ButtonStyle::Primary);

    let skip_btn = CreateButton::new(button_ids::SKIP)
        .label("Skip")
        .emoji('⏭')
        .style(ButtonStyle::Secondary);

    let stop_btn = CreateButton::new(button_ids::STOP)
        .label("Stop")
        .emoji('⏹')
        .style(ButtonStyle::Danger);

    vec![CreateActionRow::Buttons(vec![pause_btn, skip_btn, stop_btn])]
}
