use std::env;

pub struct Opts {
    pub subcommand: String,
    pub path: Option<String>,
}

const USAGE: &str = "Usage: tickpipe <run|validate> <pipeline.yaml> | tickpipe plugins";

pub fn usage() {
    eprintln!("{}", USAGE);
}

pub fn get_opts() -> Opts {
    let args: Vec<String> = env::args().collect();
    match parse(&args) {
        Some(opts) => opts,
        None => {
            usage();
            std::process::exit(1);
        }
    }
}

fn parse(args: &[String]) -> Option<Opts> {
    let subcommand = args.get(1)?.clone();
    let path = args.get(2).cloned();
    if subcommand != "plugins" && path.is_none() {
        return None;
    }
    Some(Opts { subcommand, path })
}
