/// Print a step header without a newline, so [`status!`] can finish the line.
#[macro_export]
macro_rules! log {
    ($($arg:tt)+) => {{
        print!($($arg)+);
        stdout().flush()?;
    }};
}

/// Close a [`log!`] line with the outcome of `$step`, then hand the result back.
#[macro_export]
macro_rules! status {
    ($step:expr) => {{
        let ret = $step;
        match &ret {
            Ok(_) => println!(" {}", "ok".green()),
            Err(_) => println!(" {}", "failed".red().bold()),
        }
        ret
    }};
}
