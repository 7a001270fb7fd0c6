pub mod style {
    use crossterm::style::{Color, Stylize};
    use std::fmt::{Display, Formatter};

    struct View<T: Display> {
        inner: T,
        color: Color,
    }

    impl<T: Display> Display for View<T> {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            f.write_fmt(format_args!("{}", self.inner.to_string().with(self.color)))
        }
    }

    /// Construct a wrapper type that displays values of one role (addresses,
    /// instructions, errors, ...) in a consistent color.
    macro_rules! view_struct {
        ($name: ident, $color: expr) => {
            pub struct $name<T: Display>(View<T>);

            impl<T: Display> From<T> for $name<T> {
                fn from(value: T) -> Self {
                    Self(View {
                        inner: value,
                        color: $color,
                    })
                }
            }

            impl<T: Display> Display for $name<T> {
                fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                    self.0.fmt(f)
                }
            }
        };
    }

    view_struct!(AddressView, Color::Blue);
    view_struct!(InstructionView, Color::DarkGreen);
    view_struct!(KeywordView, Color::Magenta);
    view_struct!(ErrorView, Color::Red);
    view_struct!(MutedView, Color::DarkGrey);
}
