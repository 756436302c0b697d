// Here's the list of the FTP commands implemented
pub mod abor;
pub mod appe;
pub mod auth;
pub mod cwd;
pub mod feat;
pub mod list;
pub mod mkd;
pub mod mode;
pub mod noop;
pub mod pass;
pub mod pasv;
pub mod pbsz;
pub mod port;
pub mod pret;
pub mod prot;
pub mod pwd;
pub mod quit;
pub mod rest;
pub mod retr;
pub mod stor;
pub mod stru;
pub mod syst;
pub mod type_;
pub mod user;

// Dispatch plumbing
pub mod ftpcommand;
pub mod handlers;
