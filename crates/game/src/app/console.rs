use factory_engine::{EntityId, EntityKind, Vec2};

use super::menu::MenuInput;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SessionCommand {
    Help,
    Spawn {
        kind: EntityKind,
        position: Vec2,
        quantity: Option<u32>,
    },
    Teleport {
        position: Vec2,
    },
    Mine {
        target: EntityId,
    },
    Click {
        screen: Vec2,
    },
    Inventory,
    List,
    Save {
        name: String,
    },
    Load {
        name: String,
    },
    Saves,
    Menu(MenuInput),
    NewGame,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CommandParseError {
    reason: String,
    usage: &'static str,
}

type ParseFn = fn(&[String]) -> Result<SessionCommand, CommandParseError>;

pub(crate) struct CommandSpec {
    name: &'static str,
    help: &'static str,
    arg_schema: &'static str,
    parse: ParseFn,
}

// Help output follows this order.
const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "help",
        help: "List commands",
        arg_schema: "",
        parse: parse_help_command,
    },
    CommandSpec {
        name: "spawn",
        help: "Spawn an entity",
        arg_schema: "<kind> <x:f32> <y:f32> [quantity:u32]",
        parse: parse_spawn_command,
    },
    CommandSpec {
        name: "tp",
        help: "Teleport the player",
        arg_schema: "<x:f32> <y:f32>",
        parse: parse_tp_command,
    },
    CommandSpec {
        name: "mine",
        help: "Mine an entity with the player",
        arg_schema: "<entity_id:u64>",
        parse: parse_mine_command,
    },
    CommandSpec {
        name: "click",
        help: "Mine the topmost entity under a screen point",
        arg_schema: "<sx:f32> <sy:f32>",
        parse: parse_click_command,
    },
    CommandSpec {
        name: "inv",
        help: "Show the player inventory",
        arg_schema: "",
        parse: parse_inv_command,
    },
    CommandSpec {
        name: "list",
        help: "List entities in the world",
        arg_schema: "",
        parse: parse_list_command,
    },
    CommandSpec {
        name: "save",
        help: "Save the world",
        arg_schema: "<name>",
        parse: parse_save_command,
    },
    CommandSpec {
        name: "load",
        help: "Load a saved world",
        arg_schema: "<name>",
        parse: parse_load_command,
    },
    CommandSpec {
        name: "saves",
        help: "List save files",
        arg_schema: "",
        parse: parse_saves_command,
    },
    CommandSpec {
        name: "menu",
        help: "Drive the pause menu",
        arg_schema: "<open|resume|save|load|quit|escape>",
        parse: parse_menu_command,
    },
    CommandSpec {
        name: "new",
        help: "Start a new world",
        arg_schema: "",
        parse: parse_new_command,
    },
    CommandSpec {
        name: "quit",
        help: "Quit the game",
        arg_schema: "",
        parse: parse_quit_command,
    },
];

fn lookup(input_name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|spec| spec.name.eq_ignore_ascii_case(input_name))
}

pub(crate) fn help_lines() -> impl Iterator<Item = String> {
    COMMANDS.iter().map(|spec| {
        if spec.arg_schema.is_empty() {
            format!("{} - {}", spec.name, spec.help)
        } else {
            format!("{} {} - {}", spec.name, spec.arg_schema, spec.help)
        }
    })
}

/// Parses one console line. Blank lines yield `Ok(None)`; errors are already
/// formatted for display.
pub(crate) fn parse_line(raw_line: &str) -> Result<Option<SessionCommand>, String> {
    let trimmed = raw_line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let tokens = tokenize_line(trimmed).map_err(|reason| format!("error: {reason}. usage: help"))?;
    let Some((command_name, args)) = tokens.split_first() else {
        return Ok(None);
    };
    let spec = lookup(command_name)
        .ok_or_else(|| format!("error: unknown command '{command_name}'. try: help"))?;

    (spec.parse)(args)
        .map(Some)
        .map_err(|error| format!("error: {}. usage: {}", error.reason, error.usage))
}

fn tokenize_line(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut pending = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                pending = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if pending {
                    tokens.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            _ => {
                current.push(ch);
                pending = true;
            }
        }
    }

    if in_quotes {
        return Err("unterminated quoted string".to_string());
    }
    if pending {
        tokens.push(current);
    }
    Ok(tokens)
}

fn parse_help_command(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    require_no_args(args, "help")?;
    Ok(SessionCommand::Help)
}

fn parse_spawn_command(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    const USAGE: &str = "spawn <kind> <x> <y> [quantity]";
    if args.len() != 3 && args.len() != 4 {
        return Err(CommandParseError {
            reason: "expected <kind> <x> <y> or <kind> <x> <y> <quantity>".to_string(),
            usage: USAGE,
        });
    }

    let kind = args[0].parse::<EntityKind>().map_err(|err| CommandParseError {
        reason: err.to_string(),
        usage: USAGE,
    })?;
    let position = parse_position(&args[1], &args[2], USAGE)?;
    let quantity = args
        .get(3)
        .map(|raw| {
            raw.parse::<u32>().map_err(|_| CommandParseError {
                reason: format!("invalid quantity '{raw}' (expected u32)"),
                usage: USAGE,
            })
        })
        .transpose()?;

    Ok(SessionCommand::Spawn {
        kind,
        position,
        quantity,
    })
}

fn parse_tp_command(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    const USAGE: &str = "tp <x> <y>";
    if args.len() != 2 {
        return Err(CommandParseError {
            reason: "expected exactly two arguments <x> <y>".to_string(),
            usage: USAGE,
        });
    }
    Ok(SessionCommand::Teleport {
        position: parse_position(&args[0], &args[1], USAGE)?,
    })
}

fn parse_mine_command(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    const USAGE: &str = "mine <entity_id>";
    if args.len() != 1 {
        return Err(CommandParseError {
            reason: "expected exactly one argument <entity_id>".to_string(),
            usage: USAGE,
        });
    }
    let raw = &args[0];
    let id = raw.parse::<u64>().map_err(|_| CommandParseError {
        reason: format!("invalid entity id '{raw}' (expected u64)"),
        usage: USAGE,
    })?;
    Ok(SessionCommand::Mine {
        target: EntityId(id),
    })
}

fn parse_click_command(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    const USAGE: &str = "click <sx> <sy>";
    if args.len() != 2 {
        return Err(CommandParseError {
            reason: "expected exactly two arguments <sx> <sy>".to_string(),
            usage: USAGE,
        });
    }
    Ok(SessionCommand::Click {
        screen: parse_position(&args[0], &args[1], USAGE)?,
    })
}

fn parse_inv_command(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    require_no_args(args, "inv")?;
    Ok(SessionCommand::Inventory)
}

fn parse_list_command(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    require_no_args(args, "list")?;
    Ok(SessionCommand::List)
}

fn parse_save_command(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    Ok(SessionCommand::Save {
        name: require_name(args, "save <name>")?,
    })
}

fn parse_load_command(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    Ok(SessionCommand::Load {
        name: require_name(args, "load <name>")?,
    })
}

fn parse_saves_command(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    require_no_args(args, "saves")?;
    Ok(SessionCommand::Saves)
}

fn parse_menu_command(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    const USAGE: &str = "menu <open|resume|save|load|quit|escape>";
    if args.len() != 1 {
        return Err(CommandParseError {
            reason: "expected exactly one argument".to_string(),
            usage: USAGE,
        });
    }
    let input = match args[0].to_ascii_lowercase().as_str() {
        "open" => MenuInput::Open,
        "resume" => MenuInput::Resume,
        "save" => MenuInput::Save,
        "load" => MenuInput::Load,
        "quit" => MenuInput::Quit,
        "escape" | "esc" => MenuInput::Escape,
        _ => {
            return Err(CommandParseError {
                reason: format!("unknown menu action '{}'", args[0]),
                usage: USAGE,
            });
        }
    };
    Ok(SessionCommand::Menu(input))
}

fn parse_new_command(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    require_no_args(args, "new")?;
    Ok(SessionCommand::NewGame)
}

fn parse_quit_command(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    require_no_args(args, "quit")?;
    Ok(SessionCommand::Quit)
}

fn parse_position(
    raw_x: &str,
    raw_y: &str,
    usage: &'static str,
) -> Result<Vec2, CommandParseError> {
    let parse_axis = |axis: &str, raw: &str| {
        raw.parse::<f32>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| CommandParseError {
                reason: format!("invalid {axis} coordinate '{raw}' (expected f32)"),
                usage,
            })
    };
    Ok(Vec2::new(parse_axis("x", raw_x)?, parse_axis("y", raw_y)?))
}

fn require_name(args: &[String], usage: &'static str) -> Result<String, CommandParseError> {
    match args {
        [name] if !name.trim().is_empty() => Ok(name.clone()),
        _ => Err(CommandParseError {
            reason: "expected exactly one argument <name>".to_string(),
            usage,
        }),
    }
}

fn require_no_args(args: &[String], usage: &'static str) -> Result<(), CommandParseError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(CommandParseError {
            reason: "unexpected extra arguments".to_string(),
            usage,
        })
    }
}
