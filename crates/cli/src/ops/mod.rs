mod init;
mod run;
mod show;

pub use init::Init;
pub use run::Run;
pub use show::Show;
