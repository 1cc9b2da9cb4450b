use clap::Parser;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let session = topobench_driver::Session::parse();
    topobench_driver::run(&session)
}
