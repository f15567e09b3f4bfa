use std::io::stdout;

use clap::{crate_version, App, AppSettings, Arg, Shell, SubCommand};
use postagger_utils::logger_builder;
use stdinout::OrExit;

mod subcommands;

mod traits;
use self::traits::PosApp;

static DEFAULT_CLAP_SETTINGS: &[AppSettings] = &[
    AppSettings::DontCollapseArgsInUsage,
    AppSettings::UnifiedHelpMessage,
    AppSettings::SubcommandRequiredElseHelp,
];

static LOG: &str = "LOG";

fn main() {
    // Known subapplications.
    let apps = vec![
        subcommands::PrepareApp::app(),
        subcommands::TagApp::app(),
        subcommands::TrainApp::app(),
    ];

    let cli = App::new("postagger")
        .settings(DEFAULT_CLAP_SETTINGS)
        .about("A greedy left-to-right part-of-speech tagger")
        .version(crate_version!())
        .arg(
            Arg::with_name(LOG)
                .long("log")
                .value_name("FILE")
                .help("Append log messages to a file")
                .global(true),
        )
        .subcommands(apps)
        .subcommand(
            SubCommand::with_name("completions")
                .about("Generate completion scripts for your shell")
                .setting(AppSettings::ArgRequiredElseHelp)
                .arg(Arg::with_name("shell").possible_values(&Shell::variants())),
        );
    let matches = cli.clone().get_matches();

    let log_file = matches
        .subcommand()
        .1
        .and_then(|sub_matches| sub_matches.value_of(LOG))
        .or_else(|| matches.value_of(LOG));
    logger_builder(log_file)
        .or_exit("Cannot set up logging", 1)
        .init();

    match matches.subcommand_name().unwrap() {
        "completions" => {
            let shell = matches
                .subcommand_matches("completions")
                .unwrap()
                .value_of("shell")
                .unwrap();
            write_completion_script(cli, shell.parse::<Shell>().unwrap());
        }
        "prepare" => {
            subcommands::PrepareApp::parse(matches.subcommand_matches("prepare").unwrap()).run()
        }
        "tag" => subcommands::TagApp::parse(matches.subcommand_matches("tag").unwrap()).run(),
        "train" => subcommands::TrainApp::parse(matches.subcommand_matches("train").unwrap()).run(),
        _unknown => unreachable!(),
    }
}

fn write_completion_script(mut cli: App, shell: Shell) {
    cli.gen_completions_to("postagger", shell, &mut stdout());
}
