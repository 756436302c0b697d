use crate::core_ftpcommand::ftpcommand::FtpCommand;
use crate::core_network::stream::ControlStream;
use crate::server::ServerContext;
use crate::session::Session;
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;

/// One session is owned by one task, so handlers borrow the stream and the
/// session mutably instead of locking shared state.
pub type CommandHandler = for<'a> fn(
    &'a mut ControlStream,
    &'a Arc<ServerContext>,
    &'a mut Session,
    String, // Argument text after the keyword, may be empty
) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + 'a>>;

macro_rules! handler {
    ($module:ident :: $func:ident) => {{
        fn call<'a>(
            stream: &'a mut ControlStream,
            ctx: &'a Arc<ServerContext>,
            session: &'a mut Session,
            arg: String,
        ) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + 'a>> {
            Box::pin(crate::core_ftpcommand::$module::$func(
                stream, ctx, session, arg,
            ))
        }
        call as CommandHandler
    }};
}

pub fn initialize_command_handlers() -> HashMap<FtpCommand, CommandHandler> {
    let mut handlers: HashMap<FtpCommand, CommandHandler> = HashMap::new();

    handlers.insert(FtpCommand::USER, handler!(user::handle_user_command));
    handlers.insert(FtpCommand::PASS, handler!(pass::handle_pass_command));
    handlers.insert(FtpCommand::QUIT, handler!(quit::handle_quit_command));
    handlers.insert(FtpCommand::NOOP, handler!(noop::handle_noop_command));
    handlers.insert(FtpCommand::SYST, handler!(syst::handle_syst_command));
    handlers.insert(FtpCommand::FEAT, handler!(feat::handle_feat_command));
    handlers.insert(FtpCommand::PWD, handler!(pwd::handle_pwd_command));
    handlers.insert(FtpCommand::CWD, handler!(cwd::handle_cwd_command));
    handlers.insert(FtpCommand::MKD, handler!(mkd::handle_mkd_command));
    handlers.insert(FtpCommand::LIST, handler!(list::handle_list_command));
    handlers.insert(FtpCommand::TYPE, handler!(type_::handle_type_command));
    handlers.insert(FtpCommand::MODE, handler!(mode::handle_mode_command));
    handlers.insert(FtpCommand::STRU, handler!(stru::handle_stru_command));
    handlers.insert(FtpCommand::REST, handler!(rest::handle_rest_command));
    handlers.insert(FtpCommand::PORT, handler!(port::handle_port_command));
    handlers.insert(FtpCommand::PASV, handler!(pasv::handle_pasv_command));
    handlers.insert(FtpCommand::PRET, handler!(pret::handle_pret_command));
    handlers.insert(FtpCommand::AUTH, handler!(auth::handle_auth_command));
    handlers.insert(FtpCommand::PBSZ, handler!(pbsz::handle_pbsz_command));
    handlers.insert(FtpCommand::PROT, handler!(prot::handle_prot_command));
    handlers.insert(FtpCommand::RETR, handler!(retr::handle_retr_command));
    handlers.insert(FtpCommand::STOR, handler!(stor::handle_stor_command));
    handlers.insert(FtpCommand::APPE, handler!(appe::handle_appe_command));
    handlers.insert(FtpCommand::ABOR, handler!(abor::handle_abor_command));

    handlers
}
