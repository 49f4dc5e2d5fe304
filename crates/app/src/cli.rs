//! Command line definitions

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "huddle", version, about = "Keep your group's creature happy by finishing tasks together")]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "HUDDLE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an account and sign in
    Register(Credentials),
    /// Sign in to an existing account
    Login(Credentials),
    /// Sign out on this device
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Create, join and inspect groups
    #[command(subcommand)]
    Group(GroupCommand),
    /// Add, suggest, complete and list tasks
    #[command(subcommand)]
    Task(TaskCommand),
    /// Nudge group members who are falling behind
    #[command(subcommand)]
    Nudge(NudgeCommand),
    /// View and edit your profile
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// Register this device's push token
    PushToken { token: String },
    /// Show the creature's mood for a group
    ///
    /// With mood.persistence = "write_back" this is the last mood saved by a
    /// watching session. Otherwise it is the raw formula over the group's
    /// whole lifetime, which `watch` does not use: a freshly watched group
    /// always starts at 100%.
    Mood(GroupArg),
    /// Watch the creature live until interrupted
    Watch(GroupArg),
    /// Run the realtime change feed
    #[command(subcommand)]
    Feed(FeedCommand),
    /// Inspect or create the config file
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug)]
pub struct Credentials {
    pub username: String,
    #[arg(short, long, env = "HUDDLE_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Args, Debug, Default)]
pub struct GroupArg {
    /// Group id (defaults to the selected or most recently joined group)
    #[arg(short, long)]
    pub group: Option<Uuid>,
}

#[derive(Subcommand, Debug)]
pub enum GroupCommand {
    /// Create a group and print its invite code
    Create {
        name: String,
        /// Copy the invite code to the clipboard
        #[arg(long)]
        copy: bool,
    },
    /// Join a group with an invite code
    Join { code: String },
    /// List your groups with their creatures
    List,
    /// Make a group the default for other commands
    Use { group: Uuid },
    /// List members of a group
    Members(GroupArg),
    /// Show a group's invite code
    Invite {
        #[command(flatten)]
        group: GroupArg,
        #[arg(long)]
        copy: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Add a task for yourself
    Add {
        description: String,
        #[command(flatten)]
        group: GroupArg,
    },
    /// Give a task to another member
    Assign {
        username: String,
        description: String,
        #[command(flatten)]
        group: GroupArg,
    },
    /// Ask for suggested tasks
    Suggest {
        /// What is going on this week
        prompt: Vec<String>,
        /// Ask for general wellness tasks
        #[arg(long)]
        random: bool,
        /// Add every suggestion to your tasks
        #[arg(long)]
        accept: bool,
        #[command(flatten)]
        group: GroupArg,
    },
    /// Add several tasks at once
    Accept {
        #[arg(required = true)]
        descriptions: Vec<String>,
        #[command(flatten)]
        group: GroupArg,
    },
    /// Complete a task with a photo as proof
    Complete {
        task: Uuid,
        #[arg(long)]
        photo: PathBuf,
    },
    /// List tasks in a group
    List {
        #[command(flatten)]
        group: GroupArg,
        /// Only your own tasks
        #[arg(long)]
        mine: bool,
        #[arg(long, conflicts_with = "pending")]
        completed: bool,
        #[arg(long)]
        pending: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum NudgeCommand {
    /// Nudge a member of your group
    Send {
        username: String,
        #[command(flatten)]
        group: GroupArg,
    },
    /// Check whether a member can be nudged yet
    Status {
        username: String,
        #[command(flatten)]
        group: GroupArg,
    },
    /// Nudges you received
    Inbox {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    Show,
    Update {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        bio: Option<String>,
    },
    /// Upload a new avatar image
    Avatar { path: PathBuf },
}

#[derive(Subcommand, Debug)]
pub enum FeedCommand {
    /// Serve the change feed until interrupted
    Serve {
        /// Listen address (defaults to realtime.addr from config)
        #[arg(long)]
        addr: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
    /// Write a default config file if none exists
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_task_list_flags() {
        let cli = Cli::try_parse_from(["huddle", "task", "list", "--mine", "--pending"]).unwrap();
        match cli.command {
            Command::Task(TaskCommand::List {
                mine,
                pending,
                completed,
                group,
            }) => {
                assert!(mine && pending && !completed);
                assert!(group.group.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }

        assert!(
            Cli::try_parse_from(["huddle", "task", "list", "--completed", "--pending"]).is_err()
        );
    }

    #[test]
    fn test_parse_group_create() {
        let cli = Cli::try_parse_from(["huddle", "group", "create", "Gym Rats", "--copy"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Group(GroupCommand::Create { ref name, copy: true }) if name == "Gym Rats"
        ));
    }
}
