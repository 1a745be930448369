/// Print a message and exit with a failure status.
pub fn bail(msg: &str) -> ! {
    eprintln!("{}", msg);
    ::std::process::exit(1);
}
