use crate::log_println;

const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";

macro_rules! env_or {
    ($key:literal, $default:literal) => {
        option_env!($key).unwrap_or($default)
    };
}

pub struct BannerInfo {
    pub version: &'static str,
    pub branch: &'static str,
    pub commit: &'static str,
    pub profile: &'static str,
}

impl Default for BannerInfo {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            branch: env_or!("GIT_BRANCH", "unknown"),
            commit: env_or!("GIT_COMMIT_SHORT", "unknown"),
            profile: if cfg!(debug_assertions) {
                "debug"
            } else {
                "release"
            },
        }
    }
}

pub fn print_banner(info: &BannerInfo, listen: &str) {
    log_println!();
    log_println!("{GREEN}  __    __      _       _       ___           _         {RESET}");
    log_println!("{GREEN} / / /\\ \\ \\__ _| |_ ___| |__   / _ \\__ _ _ __| |_ _   _ {RESET}");
    log_println!("{GREEN} \\ \\/  \\/ / _` | __/ __| '_ \\ / /_)/ _` | '__| __| | | |{RESET}");
    log_println!("{GREEN}  \\  /\\  / (_| | || (__| | | / ___/ (_| | |  | |_| |_| |{RESET}");
    log_println!("{GREEN}   \\/  \\/ \\__,_|\\__\\___|_| |_\\/    \\__,_|_|   \\__|\\__, |{RESET}");
    log_println!("{GREEN}                                                  |___/ {RESET}");
    log_println!("{DIM}========================================================{RESET}");
    log_println!();

    print_row("Version", info.version, CYAN);
    print_row("Branch", info.branch, RESET);
    print_row("Commit", info.commit, RESET);
    print_row("Profile", info.profile, RESET);
    print_row("Listening", listen, CYAN);
    log_println!();
}

fn print_row(label: &str, value: &str, color: &str) {
    log_println!("  {BOLD}{label:<14}{RESET}{color}{value}{RESET}");
}
