use clap::{crate_version, App, AppSettings, Arg, ArgMatches};

static DEFAULT_CLAP_SETTINGS: &[AppSettings] = &[
    AppSettings::DontCollapseArgsInUsage,
    AppSettings::UnifiedHelpMessage,
];

pub trait PosApp {
    fn app() -> App<'static, 'static>;

    fn parse(matches: &ArgMatches) -> Self;

    fn run(&self);
}

pub trait PosConfigApp: PosApp {
    const CONFIG: &'static str = "CONFIG";

    fn config_app<'a, 'b>(name: &str) -> App<'a, 'b> {
        App::new(name)
            .settings(DEFAULT_CLAP_SETTINGS)
            .version(crate_version!())
            .arg(
                Arg::with_name(Self::CONFIG)
                    .help("Tagger configuration")
                    .index(1)
                    .required(true),
            )
    }
}
