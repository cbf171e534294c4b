macro_rules! str {
    ($s:expr) => {
        $s.to_string()
    };
}

#[macro_export]
macro_rules! vname {
    ($v:tt) => {
        $crate::value::VarName(stringify!($v).to_string())
    };
}

#[macro_export]
macro_rules! var {
    ($v:tt) => {
        $crate::value::Value::Var($crate::vname!($v))
    };
}

#[macro_export]
macro_rules! atom {
    ($s:expr) => {
        $crate::value::Value::Atom($s.to_string())
    };
}

#[macro_export]
macro_rules! adisj {
    ($($m:expr),* $(,)?) => {
        $crate::value::Value::Adisj(vec![$($crate::value::Value::Atom($m.to_string())),*])
    };
}

#[macro_export]
macro_rules! avm {
    () => {
        $crate::fs::Fs::new()
    };
    ($($k:tt => $v:expr),* $(,)?) => {{
        let mut fs = $crate::fs::Fs::new();
        $(fs.set_feat($k, $v);)*
        fs
    }};
}
