//! Line-oriented command language for driving one document.

use std::str::FromStr;

use anyhow::{Context, Result, bail};
use strum::EnumString;

use quilt_store::DocumentStore;
use quilt_types::{BlockId, DocumentId, RegionHandle, SessionId};

pub const HELP: &str = "\
commands:
    open <start> <length>     lock a line range, prints its region id
    close <id>                release a region
    edit <id> <text>          replace a region's lines (\\n separates lines)
    read <start> [length]     print lines (to end of document by default)
    table                     dump the piece table
    regions                   list open regions
    stitch                    print the whole document
    compact                   fold closed regions into the original block
    save                      write the document back to disk
    help                      this text
    quit                      exit
";

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
enum Verb {
    Open,
    Close,
    Edit,
    Read,
    Table,
    Regions,
    Stitch,
    Compact,
    Save,
    #[strum(serialize = "help", serialize = "?")]
    Help,
    #[strum(serialize = "quit", serialize = "exit")]
    Quit,
}

/// A parsed command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Open { start: usize, length: usize },
    Close(RegionHandle),
    Edit { handle: RegionHandle, lines: Vec<String> },
    Read { start: usize, length: Option<usize> },
    Table,
    Regions,
    Stitch,
    Compact,
    Save,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let verb = Verb::from_str(verb).with_context(|| format!("unknown command {verb:?}"))?;
        let mut args = rest.split_whitespace();

        let command = match verb {
            Verb::Open => Command::Open {
                start: number(args.next(), "start")?,
                length: number(args.next(), "length")?,
            },
            Verb::Close => Command::Close(handle(args.next())?),
            Verb::Edit => {
                let (id, text) = rest.trim_start().split_once(' ').context("edit needs <id> <text>")?;
                Command::Edit {
                    handle: handle(Some(id))?,
                    lines: text.split("\\n").map(|l| format!("{l}\n")).collect(),
                }
            }
            Verb::Read => Command::Read {
                start: number(args.next(), "start")?,
                length: args.next().map(|s| number(Some(s), "length")).transpose()?,
            },
            Verb::Table => Command::Table,
            Verb::Regions => Command::Regions,
            Verb::Stitch => Command::Stitch,
            Verb::Compact => Command::Compact,
            Verb::Save => Command::Save,
            Verb::Help => Command::Help,
            Verb::Quit => Command::Quit,
        };
        Ok(command)
    }
}

fn number(arg: Option<&str>, what: &str) -> Result<usize> {
    let Some(arg) = arg else {
        bail!("missing <{what}>");
    };
    arg.parse().with_context(|| format!("<{what}> must be a line number, got {arg:?}"))
}

fn handle(arg: Option<&str>) -> Result<RegionHandle> {
    let id = number(arg.map(|a| a.trim_start_matches('#')), "id")?;
    Ok(RegionHandle::new(BlockId::new(id)))
}

/// One local session editing one document.
pub struct Shell {
    store: DocumentStore,
    document: DocumentId,
    session: SessionId,
    name: String,
}

impl Shell {
    /// Start a fresh session. Without a name it is labelled by its short id.
    pub fn new(store: DocumentStore, document: DocumentId, name: Option<String>) -> Self {
        let session = SessionId::new();
        Self {
            store,
            document,
            session,
            name: name.unwrap_or_else(|| session.short()),
        }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run one command and return what to print.
    pub fn execute(&self, command: &Command) -> Result<String> {
        tracing::debug!(session = %self.name, ?command, "executing");
        let doc = self.document;
        let output = match command {
            Command::Open { start, length } => {
                let handle = self.store.open_region(doc, self.session, *start, *length)?;
                format!("opened {handle}\n")
            }
            Command::Close(handle) => {
                self.store.close_region(doc, self.session, *handle)?;
                format!("closed {handle}\n")
            }
            Command::Edit { handle, lines } => {
                self.store.edit_region(doc, self.session, *handle, lines.clone())?;
                format!("edited {handle}: {} lines\n", lines.len())
            }
            Command::Read { start, length } => {
                let length = match length {
                    Some(length) => *length,
                    None => self.store.len(doc)?,
                };
                self.store.read(doc, *start, length)?.concat()
            }
            Command::Table => self.store.dump(doc)?,
            Command::Regions => self
                .store
                .regions(doc)?
                .iter()
                .map(|r| format!("{}\t{}..{}\n", r.handle, r.lines.start, r.lines.end))
                .collect(),
            Command::Stitch => self.store.stitch(doc)?.concat(),
            Command::Compact => format!("compacted: {} lines\n", self.store.compact(doc)?),
            Command::Save => format!("saved: {} lines\n", self.store.save(doc)?),
            Command::Help => HELP.to_string(),
            Command::Quit => String::new(),
        };
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quilt_store::StoreConfig;

    fn shell() -> Shell {
        let store = DocumentStore::in_memory(StoreConfig::default());
        let doc = store.create("test", "a\nb\nc\nd\ne\n");
        Shell::new(store, doc, Some("tester".to_string()))
    }

    fn run(shell: &Shell, line: &str) -> Result<String> {
        shell.execute(&line.parse()?)
    }

    #[test]
    fn test_parse() {
        assert_eq!("open 1 2".parse::<Command>().unwrap(), Command::Open { start: 1, length: 2 });
        assert_eq!(
            "CLOSE #3".parse::<Command>().unwrap(),
            Command::Close(RegionHandle::new(BlockId::new(3)))
        );
        assert_eq!("read 4".parse::<Command>().unwrap(), Command::Read { start: 4, length: None });
        assert_eq!("exit".parse::<Command>().unwrap(), Command::Quit);
        assert_eq!("?".parse::<Command>().unwrap(), Command::Help);
        assert_eq!(
            "edit 1 x\\ny".parse::<Command>().unwrap(),
            Command::Edit {
                handle: RegionHandle::new(BlockId::new(1)),
                lines: vec!["x\n".to_string(), "y\n".to_string()],
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!("frobnicate".parse::<Command>().is_err());
        assert!("open 1".parse::<Command>().is_err());
        assert!("open one 2".parse::<Command>().is_err());
        assert!("edit 1".parse::<Command>().is_err());
    }

    #[test]
    fn test_session_name() {
        assert_eq!(shell().name(), "tester");

        let store = DocumentStore::in_memory(StoreConfig::default());
        let doc = store.create("anon", "a\n");
        let anon = Shell::new(store, doc, None);
        assert_eq!(anon.name(), anon.session().short());
    }

    #[test]
    fn test_session_flow() {
        let shell = shell();
        assert_eq!(run(&shell, "open 1 2").unwrap(), "opened #1\n");
        assert!(run(&shell, "open 2 1").is_err());
        assert_eq!(run(&shell, "regions").unwrap(), "#1\t1..3\n");

        run(&shell, "edit 1 B\\nC\\nC2").unwrap();
        assert_eq!(run(&shell, "read 0 4").unwrap(), "a\nB\nC\nC2\n");
        assert_eq!(run(&shell, "read 4").unwrap(), "d\ne\n");

        run(&shell, "close 1").unwrap();
        assert_eq!(run(&shell, "compact").unwrap(), "compacted: 6 lines\n");
        assert_eq!(run(&shell, "stitch").unwrap(), "a\nB\nC\nC2\nd\ne\n");
        assert!(run(&shell, "table").unwrap().starts_with("     Block"));
    }
}
