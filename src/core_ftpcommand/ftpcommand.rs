#[derive(Eq, Hash, PartialEq, Debug, Clone, Copy)]
pub enum FtpCommand {
    USER,
    PASS,
    QUIT,
    NOOP,
    SYST,
    FEAT,
    PWD,
    CWD,
    MKD,
    LIST,
    TYPE,
    MODE,
    STRU,
    REST,
    PORT,
    PASV,
    PRET,
    AUTH,
    PBSZ,
    PROT,
    RETR,
    STOR,
    APPE,
    ABOR,
}

impl FtpCommand {
    pub fn from_str(cmd: &str) -> Option<FtpCommand> {
        match cmd.to_ascii_uppercase().as_str() {
            "USER" => Some(FtpCommand::USER),
            "PASS" => Some(FtpCommand::PASS),
            "QUIT" => Some(FtpCommand::QUIT),
            "NOOP" => Some(FtpCommand::NOOP),
            "SYST" => Some(FtpCommand::SYST),
            "FEAT" => Some(FtpCommand::FEAT),
            "PWD" => Some(FtpCommand::PWD),
            "XPWD" => Some(FtpCommand::PWD),
            "CWD" => Some(FtpCommand::CWD),
            "MKD" => Some(FtpCommand::MKD),
            "XMKD" => Some(FtpCommand::MKD),
            "LIST" => Some(FtpCommand::LIST),
            "TYPE" => Some(FtpCommand::TYPE),
            "MODE" => Some(FtpCommand::MODE),
            "STRU" => Some(FtpCommand::STRU),
            "REST" => Some(FtpCommand::REST),
            "PORT" => Some(FtpCommand::PORT),
            "PASV" => Some(FtpCommand::PASV),
            "PRET" => Some(FtpCommand::PRET),
            "AUTH" => Some(FtpCommand::AUTH),
            "PBSZ" => Some(FtpCommand::PBSZ),
            "PROT" => Some(FtpCommand::PROT),
            "RETR" => Some(FtpCommand::RETR),
            "STOR" => Some(FtpCommand::STOR),
            "APPE" => Some(FtpCommand::APPE),
            "ABOR" => Some(FtpCommand::ABOR),
            _ => None,
        }
    }

    /// Commands a client may issue before PASS succeeds. Everything else is
    /// answered with 530 by the connection loop.
    pub fn allowed_before_login(&self) -> bool {
        matches!(
            self,
            FtpCommand::USER
                | FtpCommand::PASS
                | FtpCommand::QUIT
                | FtpCommand::NOOP
                | FtpCommand::SYST
                | FtpCommand::FEAT
                | FtpCommand::AUTH
                | FtpCommand::PBSZ
                | FtpCommand::PROT
        )
    }
}
