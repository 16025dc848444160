use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::playback::notify::Notice;

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Coda Music";

/// Traduce un aviso del motor a su embed
pub fn notice_embed(notice: &Notice) -> CreateEmbed {
    let embed = match notice {
        Notice::NowPlaying {
            title,
            url,
            emoji,
            requested_by,
        } => CreateEmbed::default()
            .title(format!("{} Reproduciendo Ahora", emoji))
            .description(format!("**{}**", title))
            .url(url)
            .field("👤 Solicitado por", format!("<@{}>", requested_by), true)
            .color(colors::SUCCESS_GREEN),
        Notice::Queued { title, position } => CreateEmbed::default()
            .title("➕ Agregado a la Cola")
            .description(format!("**{}**", title))
            .field("📋 Posición", format!("#{}", position), true)
            .color(colors::MUSIC_PURPLE),
        Notice::ResolutionFailed { title } => CreateEmbed::default()
            .title("❌ No se Pudo Resolver")
            .description(format!(
                "**{}** no se pudo cargar, se continúa con lo siguiente",
                title
            ))
            .color(colors::ERROR_RED),
        Notice::PlaybackFailed { title } => CreateEmbed::default()
            .title("⚠️ Error de Reproducción")
            .description(format!("**{}** falló durante la reproducción", title))
            .color(colors::ERROR_RED),
        Notice::Halted => CreateEmbed::default()
            .title("🔌 Conexión Perdida")
            .description("Se perdió la conexión de voz; la cola queda intacta")
            .color(colors::WARNING_ORANGE),
        Notice::Restored => CreateEmbed::default()
            .title("🔄 Conexión Restaurada")
            .description("La reproducción se retoma desde donde estaba")
            .color(colors::INFO_BLUE),
        Notice::Stopped => CreateEmbed::default()
            .title("⏹️ Sesión Cerrada")
            .description("La reproducción terminó y la cola fue descartada")
            .color(colors::NEUTRAL_GRAY),
    };

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}
