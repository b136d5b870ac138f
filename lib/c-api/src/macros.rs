/// Unwrap a `Result`, or record the error and return `sentinel`.
///
/// The second form turns a `None` into the given error first.
///
/// ```rust,ignore
/// let path = c_try!(path_arg(path); otherwise ptr::null_mut());
/// let fs = c_try!(Reference::from_raw(fs), BridgeError::invalid_handle("null hdfsFS"); otherwise -1);
/// ```
#[macro_export]
macro_rules! c_try {
    ($expr:expr; otherwise $sentinel:expr) => {{
        let res: Result<_, _> = $expr;
        match res {
            Ok(val) => val,
            Err(err) => {
                $crate::error::update_last_error(err);
                return $sentinel;
            }
        }
    }};
    ($expr:expr, $e:expr; otherwise $sentinel:expr) => {{
        let opt: Option<_> = $expr;
        $crate::c_try!(opt.ok_or_else(|| $e); otherwise $sentinel)
    }};
}
