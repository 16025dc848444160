use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        skip_command(),
        skip_to_command(),
        unskip_command(),
        replay_command(),
        pause_command(),
        resume_command(),
        volume_command(),
        loop_command(),
        stop_command(),
    ]
}

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

// Comandos de reproducción

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Reproduce una canción o stream")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "query",
                "URL o término de búsqueda",
            )
            .required(true),
        )
        .add_option(CreateCommandOption::new(
            CommandOptionType::Boolean,
            "stream",
            "Tratar la URL como transmisión en vivo",
        ))
}

fn scope_option() -> CreateCommandOption {
    CreateCommandOption::new(CommandOptionType::String, "scope", "Alcance de la operación")
        .add_string_choice("Pista", "track")
        .add_string_choice("Colección", "collection")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip")
        .description("Salta la pista actual")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "by",
                "Cuántas pistas adicionales saltar",
            )
            .min_int_value(1)
            .max_int_value(100),
        )
        .add_option(scope_option())
}

fn skip_to_command() -> CreateCommand {
    CreateCommand::new("skip-to")
        .description("Salta a una posición específica")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "to", "Posición destino (1 = primera)")
                .min_int_value(1)
                .max_int_value(100)
                .required(true),
        )
        .add_option(scope_option())
}

fn unskip_command() -> CreateCommand {
    CreateCommand::new("unskip")
        .description("Vuelve a la pista anterior")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "by",
                "Cuántas pistas retroceder",
            )
            .min_int_value(1)
            .max_int_value(100),
        )
        .add_option(scope_option())
}

fn replay_command() -> CreateCommand {
    CreateCommand::new("replay")
        .description("Reinicia la reproducción actual desde cero")
        .add_option(scope_option())
}

// Comandos de control

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pausa la reproducción actual")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Reanuda la reproducción pausada")
}

fn volume_command() -> CreateCommand {
    CreateCommand::new("volume")
        .description("Ajusta el volumen de reproducción")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "level", "Volumen en porcentaje")
                .min_int_value(0)
                .max_int_value(200)
                .required(true),
        )
}

fn loop_command() -> CreateCommand {
    CreateCommand::new("loop")
        .description("Configura el modo de repetición")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "mode", "Modo de repetición")
                .add_string_choice("Desactivar", "off")
                .add_string_choice("Pista", "track")
                .add_string_choice("Colección", "collection")
                .required(true),
        )
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Detiene la reproducción y cierra la sesión")
}
