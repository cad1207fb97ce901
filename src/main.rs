fn main() -> std::process::ExitCode {
    taskboard_lib::run()
}
