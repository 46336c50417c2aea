//! Command-line front-end: `exin [options] module`.

use std::{env, process::ExitCode};

use exin::{Config, Interpreter, VERSION};

fn usage(executable: &str) {
    println!("{executable} version {VERSION}");
    println!("usage: {executable} [options] module");
    println!("options");
    println!("-d[detail] = show debug info on stderr");
    println!("    detail = sum of options (default = 1)");
    println!("    option 1: show tokens during execution");
    println!("    option 2: show block entry and exit");
    println!("    option 4: show value allocation");
    println!("    option 8: show tokens during function scan");
    println!("    option 16: dump identifiers and values on exit");
    println!("-h = show usage information");
    println!("-t[tabsize] = set tab size in spaces");
    println!("    tabsize = >= 1 (default = 4)");
    println!("-v = show version");
}

fn executable_name(argv0: Option<&String>) -> String {
    argv0
        .and_then(|path| path.rsplit(['/', '\\']).next())
        .unwrap_or("exin")
        .to_owned()
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let executable = executable_name(args.first());
    let mut config = Config::default();
    let mut module: Option<&str> = None;

    let mut rest = args.iter().skip(1);
    for arg in rest.by_ref() {
        let Some(option) = arg.strip_prefix('-') else {
            module = Some(arg.as_str());
            break;
        };
        match option.chars().next() {
            Some('h') => {
                usage(&executable);
                return ExitCode::SUCCESS;
            }
            Some('v') => {
                println!("{executable} version {VERSION}");
                return ExitCode::SUCCESS;
            }
            Some('t') => {
                let digits = &option[1..];
                if digits.is_empty() {
                    config.tabsize = 4;
                } else {
                    match digits.parse::<i64>() {
                        Ok(tabsize) if tabsize >= 1 => config.tabsize = tabsize,
                        _ => {
                            eprintln!("{executable}: invalid tab size {digits}");
                            return ExitCode::FAILURE;
                        }
                    }
                }
            }
            Some('d') => {
                let digits = &option[1..];
                if digits.is_empty() {
                    config.debug = 1;
                } else {
                    match digits.parse::<u32>() {
                        Ok(mask) => config.debug = mask,
                        Err(_) => {
                            eprintln!("{executable}: invalid debug mask {digits}");
                            return ExitCode::FAILURE;
                        }
                    }
                }
            }
            _ => {
                eprintln!("{executable}: unknown option -{option}");
                usage(&executable);
                return ExitCode::FAILURE;
            }
        }
    }

    let Some(module) = module else {
        eprintln!("{executable}: module name missing");
        usage(&executable);
        return ExitCode::FAILURE;
    };
    if rest.next().is_some() {
        eprintln!("{executable}: too many modules");
        usage(&executable);
        return ExitCode::FAILURE;
    }

    match Interpreter::new(config).run(module) {
        Ok(status) => ExitCode::from(status as u8),
        Err(err) => {
            eprint!("{err}");
            ExitCode::from(err.code() as u8)
        }
    }
}
