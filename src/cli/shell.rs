//! Interactive settings shell

use super::describe;
use crate::settings::{SettingNode, SettingPath, SettingsTree};
use anyhow::Result;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

const HELP: &str = "\
  ls [path]            list a group
  cd <path>            enter a group (`..` goes up, `/` to the root)
  get <path>           show a setting
  set <path> <value>   assign a value
  reset <path>         restore the default
  find <text>          search the current group
  pwd                  print the current group
  exit                 leave the shell";

/// Shell state: the tree being edited and the current group
pub struct Shell<'a> {
    tree: &'a mut SettingsTree,
    cwd: SettingPath,
}

/// Result of one shell line
#[derive(Debug, PartialEq)]
pub enum Outcome {
    Continue(Vec<String>),
    Exit,
}

impl<'a> Shell<'a> {
    pub fn new(tree: &'a mut SettingsTree) -> Self {
        Self {
            tree,
            cwd: SettingPath::root(),
        }
    }

    pub fn cwd(&self) -> &SettingPath {
        &self.cwd
    }

    fn resolve(&self, arg: &str) -> SettingPath {
        let arg = arg.trim();
        if arg.starts_with('/') || arg.starts_with("@@") {
            return SettingPath::parse_user(arg);
        }

        let mut path = self.cwd.clone();
        for segment in arg.split('/').filter(|s| !s.is_empty()) {
            path = match segment {
                ".." => path.parent().unwrap_or_else(SettingPath::root),
                "." => path,
                key => path.child(key),
            };
        }
        path
    }

    /// Split `<path> <value>`, allowing spaces in setting keys by matching
    /// the longest existing path prefix
    fn split_path_value(&self, rest: &str) -> Option<(SettingPath, String)> {
        let words: Vec<&str> = rest.split_whitespace().collect();
        (1..words.len()).rev().find_map(|split| {
            let path = self.resolve(&words[..split].join(" "));
            self.tree
                .leaf(&path)
                .ok()
                .map(|_| (path, words[split..].join(" ")))
        })
    }

    /// Run one command line; errors are reported as output, never returned
    pub fn execute(&mut self, line: &str) -> Outcome {
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        let result: Result<Vec<String>> = match command {
            "" => Ok(Vec::new()),
            "exit" | "quit" => return Outcome::Exit,
            "help" | "?" => Ok(HELP.lines().map(str::to_string).collect()),
            "pwd" => Ok(vec![if self.cwd.is_root() {
                "/".to_string()
            } else {
                self.cwd.title()
            }]),
            "ls" => describe(&*self.tree, &self.resolve(rest)),
            "get" => describe(&*self.tree, &self.resolve(rest)),
            "cd" => {
                let target = if rest.is_empty() {
                    SettingPath::root()
                } else {
                    self.resolve(rest)
                };
                match self.tree.node(&target) {
                    Ok(SettingNode::Group(_)) => {
                        self.cwd = target;
                        Ok(Vec::new())
                    }
                    Ok(SettingNode::Leaf(_)) => {
                        Err(anyhow::anyhow!("{} is a setting, not a group", target.title()))
                    }
                    Err(e) => Err(e.into()),
                }
            }
            "find" => self
                .tree
                .search(&self.cwd, rest)
                .map(|keys| keys.into_iter().map(str::to_string).collect())
                .map_err(Into::into),
            "set" => match self.split_path_value(rest) {
                Some((path, value)) => self
                    .tree
                    .set_raw(&path, &value)
                    .map_err(Into::into)
                    .and_then(|_| describe(&*self.tree, &path)),
                None => Err(anyhow::anyhow!("usage: set <path> <value>")),
            },
            "reset" => {
                let path = self.resolve(rest);
                self.tree
                    .reset(&path)
                    .map_err(Into::into)
                    .and_then(|_| describe(&*self.tree, &path))
            }
            other => Err(anyhow::anyhow!("unknown command '{}', try 'help'", other)),
        };

        match result {
            Ok(lines) => Outcome::Continue(lines),
            Err(e) => Outcome::Continue(vec![format!("error: {}", e)]),
        }
    }
}

/// Interactive loop over stdin
pub fn run(tree: &mut SettingsTree) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let mut shell = Shell::new(tree);
    println!("{}", "Settings shell, 'help' lists commands".bold().cyan());

    loop {
        let prompt = if shell.cwd().is_root() {
            "settings> ".to_string()
        } else {
            format!("settings:{}> ", shell.cwd().title())
        };

        match rl.readline(&prompt) {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());
                match shell.execute(&line) {
                    Outcome::Exit => break,
                    Outcome::Continue(lines) => {
                        for line in lines {
                            if line.starts_with("error:") {
                                println!("{}", line.red());
                            } else {
                                println!("{}", line);
                            }
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::ConsoleBridge;
    use std::sync::Arc;

    fn tree() -> SettingsTree {
        let bridge = ConsoleBridge::in_memory(ConsoleBridge::default_document(), "/tmp/keys");
        SettingsTree::load(Arc::new(bridge)).unwrap()
    }

    fn lines(outcome: Outcome) -> Vec<String> {
        match outcome {
            Outcome::Continue(lines) => lines,
            Outcome::Exit => panic!("shell exited"),
        }
    }

    #[test]
    fn test_navigation() {
        let mut tree = tree();
        let mut shell = Shell::new(&mut tree);

        assert_eq!(lines(shell.execute("ls")), vec!["Core/", "Video/", "Audio/"]);
        assert!(lines(shell.execute("cd Video")).is_empty());
        assert_eq!(lines(shell.execute("pwd")), vec!["Video"]);
        assert_eq!(lines(shell.execute("find scale")), vec!["Resolution Scale"]);
        assert!(lines(shell.execute("cd ..")).is_empty());
        assert_eq!(lines(shell.execute("pwd")), vec!["/"]);
        assert!(lines(shell.execute("cd Video/Renderer"))[0].starts_with("error:"));
        assert_eq!(shell.execute("exit"), Outcome::Exit);
    }

    #[test]
    fn test_set_key_with_spaces() {
        let mut tree = tree();
        let mut shell = Shell::new(&mut tree);
        shell.execute("cd Video");

        assert_eq!(
            lines(shell.execute("set Resolution Scale 200")),
            vec!["Resolution Scale * = 200"]
        );
        assert_eq!(
            lines(shell.execute("reset Resolution Scale")),
            vec!["Resolution Scale = 100"]
        );

        let out = lines(shell.execute("set Resolution Scale 5000"));
        assert!(out[0].starts_with("error:"), "{:?}", out);
    }
}
